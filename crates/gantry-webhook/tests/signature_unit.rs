// crates/gantry-webhook/tests/signature_unit.rs
// ============================================================================
// Module: Signature Verification Unit Tests
// Description: HMAC verification, prefix handling, and identity resolution.
// Purpose: Validate the authentication boundary for inbound deliveries.
// ============================================================================

//! Webhook signature verification tests.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use gantry_core::Pipeline;
use gantry_core::PipelineId;
use gantry_core::TenantId;
use gantry_core::Timestamp;
use gantry_webhook::compute_signature;
use gantry_webhook::verify_for_pipelines;
use gantry_webhook::verify_signature;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn signed_header(secret: &str, body: &[u8]) -> String {
    format!("sha256={}", compute_signature(secret, body))
}

fn pipeline(raw_id: u64, secret: &str) -> Pipeline {
    Pipeline {
        id: PipelineId::from_raw(raw_id).unwrap(),
        tenant_id: TenantId::from_raw(1).unwrap(),
        name: format!("pipeline-{raw_id}"),
        slug: format!("pipeline-{raw_id}"),
        repo_url: "https://github.com/acme/app.git".to_string(),
        default_branch: "main".to_string(),
        config_path: ".gantry/pipeline.yml".to_string(),
        webhook_secret: secret.to_string(),
        active: true,
        last_execution_at: None,
        created_at: Timestamp::from_unix_millis(0),
    }
}

// ============================================================================
// SECTION: Single-Secret Verification
// ============================================================================

#[test]
fn valid_signature_verifies() {
    // Seed scenario: body signed with the configured secret.
    let body = br#"{"ref":"refs/heads/main"}"#;
    let header = signed_header("s3cret", body);
    assert!(verify_signature(body, Some(&header), "s3cret"));
}

#[test]
fn flipping_one_nibble_fails() {
    let body = b"payload";
    let mut header = signed_header("s3cret", body);
    // Flip the final hex nibble.
    let last = header.pop().unwrap();
    header.push(if last == '0' { '1' } else { '0' });
    assert!(!verify_signature(body, Some(&header), "s3cret"));
}

#[test]
fn missing_prefix_fails() {
    let body = b"payload";
    let digest = compute_signature("s3cret", body);
    assert!(!verify_signature(body, Some(&digest), "s3cret"));
}

#[test]
fn missing_header_with_secret_fails() {
    assert!(!verify_signature(b"payload", None, "s3cret"));
    assert!(!verify_signature(b"payload", Some(""), "s3cret"));
}

#[test]
fn missing_secret_accepts_in_development_mode() {
    assert!(verify_signature(b"payload", None, ""));
    assert!(verify_signature(b"payload", Some("sha256=junk"), ""));
}

#[test]
fn wrong_secret_fails() {
    let body = b"payload";
    let header = signed_header("other", body);
    assert!(!verify_signature(body, Some(&header), "s3cret"));
}

// ============================================================================
// SECTION: Multi-Pipeline Resolution
// ============================================================================

#[test]
fn first_verifying_pipeline_wins() {
    let body = b"payload";
    let pipelines = vec![pipeline(1, "alpha"), pipeline(2, "beta")];
    let header = signed_header("beta", body);
    let verified = verify_for_pipelines(body, Some(&header), &pipelines, "");
    assert_eq!(verified.map(|pipeline| pipeline.id.get()), Some(2));
}

#[test]
fn no_verifying_secret_rejects() {
    let body = b"payload";
    let pipelines = vec![pipeline(1, "alpha"), pipeline(2, "beta")];
    let header = signed_header("gamma", body);
    assert!(verify_for_pipelines(body, Some(&header), &pipelines, "").is_none());
}

#[test]
fn fallback_secret_covers_secretless_pipelines() {
    let body = b"payload";
    let pipelines = vec![pipeline(1, ""), pipeline(2, "")];
    let header = signed_header("fallback", body);
    let verified = verify_for_pipelines(body, Some(&header), &pipelines, "fallback");
    assert_eq!(verified.map(|pipeline| pipeline.id.get()), Some(1));

    let bad = signed_header("wrong", body);
    assert!(verify_for_pipelines(body, Some(&bad), &pipelines, "fallback").is_none());
}

#[test]
fn all_secretless_accepts_first_in_development_mode() {
    let pipelines = vec![pipeline(1, ""), pipeline(2, "")];
    let verified = verify_for_pipelines(b"payload", None, &pipelines, "");
    assert_eq!(verified.map(|pipeline| pipeline.id.get()), Some(1));
}
