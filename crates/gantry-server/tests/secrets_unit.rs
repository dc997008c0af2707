// crates/gantry-server/tests/secrets_unit.rs
// ============================================================================
// Module: Secrets Cipher Unit Tests
// Description: Per-tenant key derivation and sealed-value round trips.
// Purpose: Validate tenant isolation of ciphertext and materialization.
// ============================================================================

//! Secrets cipher tests.

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

use gantry_core::Secret;
use gantry_core::SecretId;
use gantry_core::SecretScope;
use gantry_core::TenantId;
use gantry_core::Timestamp;
use gantry_server::secrets::SecretCipher;
use gantry_server::secrets::SecretCipherError;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn tenant(raw: u64) -> TenantId {
    TenantId::from_raw(raw).unwrap()
}

// ============================================================================
// SECTION: Round Trips
// ============================================================================

#[test]
fn encrypt_then_decrypt_round_trips() {
    let cipher = SecretCipher::new("master-key");
    let sealed = cipher.encrypt(tenant(1), "deploy-token-value").unwrap();
    assert_ne!(sealed, "deploy-token-value");
    let opened = cipher.decrypt(tenant(1), &sealed).unwrap();
    assert_eq!(opened, "deploy-token-value");
}

#[test]
fn nonces_differ_across_encryptions() {
    let cipher = SecretCipher::new("master-key");
    let first = cipher.encrypt(tenant(1), "same-value").unwrap();
    let second = cipher.encrypt(tenant(1), "same-value").unwrap();
    assert_ne!(first, second);
}

// ============================================================================
// SECTION: Tenant Isolation
// ============================================================================

#[test]
fn ciphertext_never_decrypts_across_tenants() {
    let cipher = SecretCipher::new("master-key");
    let sealed = cipher.encrypt(tenant(1), "tenant-one-secret").unwrap();
    let cross = cipher.decrypt(tenant(2), &sealed);
    assert!(matches!(cross, Err(SecretCipherError::DecryptFailed)));
}

#[test]
fn different_master_keys_never_decrypt() {
    let sealed = SecretCipher::new("master-a")
        .encrypt(tenant(1), "value")
        .unwrap();
    let cross = SecretCipher::new("master-b").decrypt(tenant(1), &sealed);
    assert!(matches!(cross, Err(SecretCipherError::DecryptFailed)));
}

// ============================================================================
// SECTION: Malformed Input
// ============================================================================

#[test]
fn malformed_ciphertext_is_rejected() {
    let cipher = SecretCipher::new("master-key");
    assert!(matches!(
        cipher.decrypt(tenant(1), "!!not-base64!!"),
        Err(SecretCipherError::Malformed)
    ));
    assert!(matches!(
        cipher.decrypt(tenant(1), "c2hvcnQ"),
        Err(SecretCipherError::Malformed)
    ));
}

// ============================================================================
// SECTION: Materialization
// ============================================================================

#[test]
fn materialize_skips_undecryptable_entries() {
    let cipher = SecretCipher::new("master-key");
    let good = Secret {
        id: SecretId::from_raw(1).unwrap(),
        tenant_id: tenant(1),
        pipeline_id: None,
        name: "GOOD".to_string(),
        ciphertext: cipher.encrypt(tenant(1), "good-value").unwrap(),
        scope: SecretScope::Organization,
        last_updated_by: None,
        created_at: Timestamp::from_unix_millis(0),
    };
    let foreign = Secret {
        id: SecretId::from_raw(2).unwrap(),
        name: "FOREIGN".to_string(),
        // Sealed for a different tenant; must not materialize.
        ciphertext: cipher.encrypt(tenant(2), "foreign-value").unwrap(),
        ..good.clone()
    };

    let materialized = cipher.materialize(tenant(1), &[good, foreign]);
    assert_eq!(materialized.get("GOOD"), Some(&json!("good-value")));
    assert!(!materialized.contains_key("FOREIGN"));
}
