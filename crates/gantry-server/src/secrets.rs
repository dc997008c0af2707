// crates/gantry-server/src/secrets.rs
// ============================================================================
// Module: Secrets Cipher
// Description: Per-tenant AES-256-GCM encryption with PBKDF2-derived keys.
// Purpose: Keep secret plaintext out of storage, APIs, and logs.
// Dependencies: aes-gcm, base64, gantry-core, pbkdf2, rand, sha2, thiserror
// ============================================================================

//! ## Overview
//! Every tenant's key is derived from the master key with
//! PBKDF2-HMAC-SHA256 (100 000 iterations, salt = tenant id), so ciphertext
//! never decrypts across tenants. Values are sealed with AES-256-GCM under
//! a random 12-byte nonce and stored as `base64(nonce || ciphertext)`.
//! Plaintext exists only inside short-lived job-assignment payloads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use aes_gcm::Aes256Gcm;
use aes_gcm::Nonce;
use aes_gcm::aead::Aead;
use aes_gcm::aead::KeyInit;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use gantry_core::Secret;
use gantry_core::TenantId;
use pbkdf2::pbkdf2_hmac_array;
use rand::RngCore;
use serde_json::Map;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Parameters
// ============================================================================

/// PBKDF2 iteration count for tenant key derivation.
const PBKDF2_ITERATIONS: u32 = 100_000;
/// Derived key size in bytes (AES-256).
const KEY_SIZE: usize = 32;
/// AES-GCM nonce size in bytes.
const NONCE_SIZE: usize = 12;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Secrets cipher errors.
///
/// # Invariants
/// - Variants never carry plaintext or key material.
#[derive(Debug, Error)]
pub enum SecretCipherError {
    /// Ciphertext is not valid base64 or is truncated.
    #[error("malformed ciphertext")]
    Malformed,
    /// Authenticated decryption failed (wrong tenant or corrupted data).
    #[error("decryption failed")]
    DecryptFailed,
    /// Encryption failed.
    #[error("encryption failed")]
    EncryptFailed,
}

// ============================================================================
// SECTION: Cipher
// ============================================================================

/// Per-tenant secrets cipher bound to the master key.
///
/// # Invariants
/// - The master key is held in memory only; it is never logged or serialized.
#[derive(Clone)]
pub struct SecretCipher {
    /// Master key material.
    master: String,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

impl SecretCipher {
    /// Creates a cipher over the master key.
    #[must_use]
    pub fn new(master: impl Into<String>) -> Self {
        Self {
            master: master.into(),
        }
    }

    /// Derives the tenant key.
    fn tenant_key(&self, tenant_id: TenantId) -> [u8; KEY_SIZE] {
        let salt = tenant_id.get().to_string();
        pbkdf2_hmac_array::<Sha256, KEY_SIZE>(
            self.master.as_bytes(),
            salt.as_bytes(),
            PBKDF2_ITERATIONS,
        )
    }

    /// Encrypts a plaintext value for a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`SecretCipherError::EncryptFailed`] when sealing fails.
    pub fn encrypt(
        &self,
        tenant_id: TenantId,
        plaintext: &str,
    ) -> Result<String, SecretCipherError> {
        let key = self.tenant_key(tenant_id);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| SecretCipherError::EncryptFailed)?;

        let mut nonce_bytes = [0_u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| SecretCipherError::EncryptFailed)?;

        let mut payload = Vec::with_capacity(NONCE_SIZE + sealed.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&sealed);
        Ok(BASE64.encode(payload))
    }

    /// Decrypts a stored ciphertext for a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`SecretCipherError`] on malformed input or failed
    /// authentication.
    pub fn decrypt(
        &self,
        tenant_id: TenantId,
        ciphertext: &str,
    ) -> Result<String, SecretCipherError> {
        let payload = BASE64
            .decode(ciphertext)
            .map_err(|_| SecretCipherError::Malformed)?;
        if payload.len() <= NONCE_SIZE {
            return Err(SecretCipherError::Malformed);
        }
        let (nonce_bytes, sealed) = payload.split_at(NONCE_SIZE);

        let key = self.tenant_key(tenant_id);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| SecretCipherError::DecryptFailed)?;
        let plain = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| SecretCipherError::DecryptFailed)?;
        String::from_utf8(plain).map_err(|_| SecretCipherError::DecryptFailed)
    }

    /// Materializes secrets for a job-assignment payload.
    ///
    /// Secrets that fail to decrypt are skipped rather than failing the
    /// dispatch; the names are logged by the caller, never the values.
    #[must_use]
    pub fn materialize(&self, tenant_id: TenantId, secrets: &[Secret]) -> Map<String, Value> {
        let mut materialized = Map::new();
        for secret in secrets {
            if let Ok(plaintext) = self.decrypt(tenant_id, &secret.ciphertext) {
                materialized.insert(secret.name.clone(), Value::String(plaintext));
            }
        }
        materialized
    }
}
