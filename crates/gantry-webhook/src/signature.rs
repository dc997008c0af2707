// crates/gantry-webhook/src/signature.rs
// ============================================================================
// Module: Webhook Signature Verification
// Description: Constant-time HMAC-SHA256 verification of delivery bodies.
// Purpose: Authenticate deliveries against per-pipeline webhook secrets.
// Dependencies: gantry-core, hex, hmac, sha2, subtle, tracing
// ============================================================================

//! ## Overview
//! Vendors sign each delivery with `sha256=<hex(HMAC-SHA256(secret, body))>`
//! in the signature header. Verification recomputes the digest and compares
//! hex strings in constant time. A missing secret accepts the delivery in
//! development mode (logged); a missing header with a secret configured
//! rejects. When a delivery matches several pipelines with different
//! secrets, the first pipeline whose secret verifies becomes the verified
//! identity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use gantry_core::Pipeline;
use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

// ============================================================================
// SECTION: Signature Computation
// ============================================================================

/// Prefix carried by the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// HMAC-SHA256 keyed by the webhook secret.
type HmacSha256 = Hmac<Sha256>;

/// Computes the hex HMAC-SHA256 digest of a delivery body.
#[must_use]
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so construction cannot fail; an empty
    // digest on the impossible branch still fails verification closed.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Verifies a delivery body against the signature header and a secret.
///
/// A missing secret accepts (development mode, logged); a missing or
/// malformed header with a secret configured rejects. Digest comparison is
/// constant-time; only the length check, which is not secret-dependent,
/// short-circuits.
#[must_use]
pub fn verify_signature(body: &[u8], header: Option<&str>, secret: &str) -> bool {
    if secret.is_empty() {
        warn!("no webhook secret configured, skipping signature verification");
        return true;
    }
    let Some(header) = header.filter(|header| !header.is_empty()) else {
        warn!("missing signature header on authenticated webhook");
        return false;
    };
    let Some(provided) = header.strip_prefix(SIGNATURE_PREFIX) else {
        warn!("signature header does not carry the sha256= prefix");
        return false;
    };

    let expected = compute_signature(secret, body);
    let matches = expected.as_bytes().ct_eq(provided.as_bytes());
    let is_valid = bool::from(matches);
    if !is_valid {
        warn!("webhook signature verification failed");
    }
    is_valid
}

/// Resolves the verified pipeline identity for a multi-pipeline delivery.
///
/// Pipelines carrying a secret are tried in order and the first whose secret
/// verifies wins. When no candidate carries a secret, the fallback secret is
/// tried; when that is also unset, the first candidate is accepted in
/// development mode (logged).
#[must_use]
pub fn verify_for_pipelines<'a>(
    body: &[u8],
    header: Option<&str>,
    pipelines: &'a [Pipeline],
    fallback_secret: &str,
) -> Option<&'a Pipeline> {
    for pipeline in pipelines {
        if !pipeline.webhook_secret.is_empty()
            && verify_signature(body, header, &pipeline.webhook_secret)
        {
            return Some(pipeline);
        }
    }

    let any_secret_configured = pipelines
        .iter()
        .any(|pipeline| !pipeline.webhook_secret.is_empty());
    if any_secret_configured {
        return None;
    }

    if !fallback_secret.is_empty() {
        if verify_signature(body, header, fallback_secret) {
            return pipelines.first();
        }
        return None;
    }

    warn!("no webhook secrets configured for matching pipelines, skipping verification");
    pipelines.first()
}
