// crates/gantry-core/src/core/secret.rs
// ============================================================================
// Module: Secret Records
// Description: Encrypted secret entity scoped to a tenant or pipeline.
// Purpose: Store ciphertext only; plaintext never leaves dispatch payloads.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Secrets are stored as ciphertext produced by a per-tenant derived key.
//! Plaintext is decrypted only while materializing a job-assignment payload
//! and is never persisted, returned by APIs, or logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::PipelineId;
use crate::core::identifiers::SecretId;
use crate::core::identifiers::TenantId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Scope
// ============================================================================

/// Visibility scope of a secret.
///
/// # Invariants
/// - Variants are stable for serialization and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecretScope {
    /// Visible to every pipeline of the tenant.
    #[default]
    Organization,
    /// Visible to one pipeline only.
    Pipeline,
}

impl SecretScope {
    /// Returns a stable label for logs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Pipeline => "pipeline",
        }
    }

    /// Parses a stable label back into a scope.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "organization" => Some(Self::Organization),
            "pipeline" => Some(Self::Pipeline),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Secret Record
// ============================================================================

/// Secret entity.
///
/// # Invariants
/// - `(tenant_id, pipeline_id, name)` is unique.
/// - `pipeline_id` is present exactly when `scope` is `Pipeline`.
/// - `ciphertext` is opaque to the store; only the secrets cipher interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    /// Secret identifier.
    pub id: SecretId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning pipeline for pipeline-scoped secrets.
    pub pipeline_id: Option<PipelineId>,
    /// Secret name (e.g. `DEPLOY_TOKEN`).
    pub name: String,
    /// Encrypted value (base64 of nonce plus ciphertext).
    pub ciphertext: String,
    /// Visibility scope.
    pub scope: SecretScope,
    /// User who last updated the value.
    pub last_updated_by: Option<UserId>,
    /// Creation time.
    pub created_at: Timestamp,
}
