// crates/gantry-core/src/core/artifact.rs
// ============================================================================
// Module: Artifact Records
// Description: Build artifact entity with retention and expiry.
// Purpose: Track files produced by jobs without owning the blob storage.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Artifacts are files produced by jobs. The control plane stores metadata
//! and a storage-backend path; the blob backend itself is an external
//! collaborator. Expiry is fixed at creation (`created_at + retention_days`)
//! and reads past expiry fail.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::ExecutionId;
use crate::core::identifiers::JobId;
use crate::core::identifiers::TenantId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Artifact Record
// ============================================================================

/// Default artifact retention in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Artifact entity.
///
/// # Invariants
/// - `expires_at == created_at + retention_days` at creation.
/// - `checksum_sha256` is the hex digest of the stored bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact identifier.
    pub id: ArtifactId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning execution.
    pub execution_id: ExecutionId,
    /// Producing job.
    pub job_id: JobId,
    /// Artifact name for reference.
    pub name: String,
    /// Path in the storage backend.
    pub storage_path: String,
    /// Total size in bytes.
    pub size_bytes: u64,
    /// Hex SHA-256 checksum of the stored bytes.
    pub checksum_sha256: String,
    /// Number of files inside the artifact.
    pub file_count: u32,
    /// Compression algorithm label (empty when uncompressed).
    pub compression: String,
    /// Retention in days.
    pub retention_days: u32,
    /// Expiry time, fixed at creation.
    pub expires_at: Timestamp,
    /// Creation time.
    pub created_at: Timestamp,
}

impl Artifact {
    /// Returns true when the artifact is past its expiry time.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }

    /// Returns the size in megabytes.
    #[must_use]
    pub fn size_mb(&self) -> f64 {
        #[allow(
            clippy::cast_precision_loss,
            reason = "Artifact sizes are far below f64 integer precision."
        )]
        let bytes = self.size_bytes as f64;
        bytes / (1024.0 * 1024.0)
    }
}
