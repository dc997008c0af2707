// crates/gantry-core/src/core/pipeline.rs
// ============================================================================
// Module: Pipeline Records
// Description: Pipeline entity and its versioned configurations.
// Purpose: Bind a repository to a workflow definition with frozen history.
// Dependencies: crate::core::{identifiers, time, workflow}, serde
// ============================================================================

//! ## Overview
//! A pipeline binds a source repository to a YAML workflow. Configurations
//! are versioned: every change appends a new [`PipelineConfigRecord`] with a
//! monotonically increasing version, and executions freeze a reference to the
//! config that drove them so later edits never mutate history. A pipeline
//! with no valid configuration cannot be triggered.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ConfigId;
use crate::core::identifiers::PipelineId;
use crate::core::identifiers::TenantId;
use crate::core::time::Timestamp;
use crate::core::workflow::WorkflowSpec;

// ============================================================================
// SECTION: Pipeline Record
// ============================================================================

/// Pipeline entity.
///
/// # Invariants
/// - `(tenant_id, slug)` is unique.
/// - Inactive pipelines are excluded from webhook matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline identifier.
    pub id: PipelineId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Human-readable pipeline name.
    pub name: String,
    /// URL-safe slug, unique within the tenant.
    pub slug: String,
    /// Source repository URL (HTTPS or SSH form).
    pub repo_url: String,
    /// Default branch of the repository.
    pub default_branch: String,
    /// Path of the workflow file inside the repository.
    pub config_path: String,
    /// Webhook secret used to verify inbound deliveries (empty when unset).
    pub webhook_secret: String,
    /// Whether the pipeline is active.
    pub active: bool,
    /// Time of the most recent execution, when any.
    pub last_execution_at: Option<Timestamp>,
    /// Creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Versioned Configuration
// ============================================================================

/// One stored version of a pipeline's workflow configuration.
///
/// # Invariants
/// - `(pipeline_id, version)` is unique; versions increase monotonically.
/// - `parsed` is present exactly when normalization produced a spec, even an
///   invalid one; `is_valid` is authoritative for triggering.
/// - Records are immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfigRecord {
    /// Configuration identifier.
    pub id: ConfigId,
    /// Owning pipeline.
    pub pipeline_id: PipelineId,
    /// Monotonic version, 1-based.
    pub version: u64,
    /// Raw YAML document as submitted.
    pub yaml_raw: String,
    /// Normalized workflow spec, when the document parsed at all.
    pub parsed: Option<WorkflowSpec>,
    /// Commit SHA the configuration was read from (empty when unknown).
    pub commit_sha: String,
    /// Whether the configuration passed validation.
    pub is_valid: bool,
    /// Accumulated validation errors (empty when valid).
    pub validation_errors: Vec<String>,
    /// Creation time.
    pub created_at: Timestamp,
}
