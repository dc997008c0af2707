// crates/gantry-server/src/auth.rs
// ============================================================================
// Module: Token Authentication
// Description: API key and runner token formats, hashing, and scope checks.
// Purpose: Authenticate programmatic callers and runner sessions.
// Dependencies: base64, gantry-core, hex, rand, sha2, subtle
// ============================================================================

//! ## Overview
//! Two token families share one shape: a recognizable prefix followed by a
//! urlsafe 32-byte secret. Only the hex SHA-256 hash is stored; the raw
//! token is shown once at creation. API keys additionally keep their first
//! 8 characters unencrypted for display. Hash comparison is constant-time.
//! JWT login and refresh are external collaborators; [`AuthContext`] is the
//! seam they populate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use gantry_core::ApiKeyRecord;
use gantry_core::User;
use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;

// ============================================================================
// SECTION: Token Formats
// ============================================================================

/// API key prefix.
pub const API_KEY_PREFIX: &str = "mci_";
/// Runner registration token prefix.
pub const RUNNER_TOKEN_PREFIX: &str = "mci_runner_";
/// Length of the stored API key display prefix.
pub const KEY_PREFIX_LENGTH: usize = 8;
/// Length of the random token secret in bytes.
const TOKEN_SECRET_BYTES: usize = 32;

/// A freshly generated token with its storable forms.
///
/// # Invariants
/// - `raw` is shown once and never stored.
#[derive(Debug, Clone)]
pub struct GeneratedToken {
    /// Raw token to hand to the caller exactly once.
    pub raw: String,
    /// Hex SHA-256 hash for storage.
    pub hash: String,
    /// First characters of the raw token for display.
    pub prefix: String,
}

/// Generates a token with the given prefix.
fn generate_with_prefix(prefix: &str) -> GeneratedToken {
    let mut secret = [0_u8; TOKEN_SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut secret);
    let raw = format!("{prefix}{}", URL_SAFE_NO_PAD.encode(secret));
    let hash = hash_token(&raw);
    let display = raw.chars().take(KEY_PREFIX_LENGTH).collect();
    GeneratedToken {
        raw,
        hash,
        prefix: display,
    }
}

/// Generates a new API key (`mci_<urlsafe-32-byte-secret>`).
#[must_use]
pub fn generate_api_key() -> GeneratedToken {
    generate_with_prefix(API_KEY_PREFIX)
}

/// Generates a new runner token (`mci_runner_<urlsafe-32-byte-secret>`).
#[must_use]
pub fn generate_runner_token() -> GeneratedToken {
    generate_with_prefix(RUNNER_TOKEN_PREFIX)
}

/// Computes the hex SHA-256 hash of a raw token.
#[must_use]
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Compares a raw token against a stored hash in constant time.
#[must_use]
pub fn token_matches(raw: &str, stored_hash: &str) -> bool {
    let computed = hash_token(raw);
    bool::from(computed.as_bytes().ct_eq(stored_hash.as_bytes()))
}

// ============================================================================
// SECTION: Auth Context
// ============================================================================

/// Authenticated caller identity threaded through handlers.
///
/// # Invariants
/// - At most one of `user`/`api_key` drives tenant resolution; the user
///   wins when both are present.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// Authenticated user, when a bearer token was presented.
    pub user: Option<User>,
    /// Authenticated API key, when one was presented.
    pub api_key: Option<ApiKeyRecord>,
}

impl AuthContext {
    /// Returns true when the context grants a scope.
    ///
    /// User sessions carry full scopes; API keys check their grant list.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        if self.user.is_some() {
            return true;
        }
        self.api_key
            .as_ref()
            .is_some_and(|key| key.has_scope(scope))
    }
}
