// crates/gantry-core/src/core/runner.rs
// ============================================================================
// Module: Runner Records
// Description: Runner entity with labels, capacity, and liveness tracking.
// Purpose: Authoritative state for an external worker process.
// Dependencies: crate::core::{identifiers, status, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! A runner is an external worker that authenticates to the control plane
//! over a persistent session and executes assigned jobs. Shared runners have
//! no tenant binding and serve any tenant; dedicated and self-hosted runners
//! serve exactly one. Liveness is heartbeat-driven: a runner silent past the
//! offline threshold is marked offline and its in-flight jobs are requeued.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::RunnerId;
use crate::core::identifiers::TenantId;
use crate::core::status::RunnerStatus;
use crate::core::status::RunnerType;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Runner Record
// ============================================================================

/// Runner entity.
///
/// # Invariants
/// - `tenant_id` is `None` exactly when `runner_type` is `Shared`.
/// - `token_hash` is a hex SHA-256 of the registration token; the raw token
///   is shown once at creation and never stored.
/// - `current_jobs` never exceeds `max_concurrent_jobs` under correct
///   dispatch accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runner {
    /// Runner identifier.
    pub id: RunnerId,
    /// Owning tenant (`None` for shared runners).
    pub tenant_id: Option<TenantId>,
    /// Human-readable runner name.
    pub name: String,
    /// Hex SHA-256 hash of the registration token.
    pub token_hash: String,
    /// Deployment type.
    pub runner_type: RunnerType,
    /// Labels used for job matching (e.g. `linux`, `docker`, `gpu`).
    pub labels: Vec<String>,
    /// Available executors and features, as reported by the runner.
    pub capabilities: Map<String, Value>,
    /// Availability status.
    pub status: RunnerStatus,
    /// Time of the most recent heartbeat.
    pub last_heartbeat: Option<Timestamp>,
    /// System information reported by the runner (OS, CPU, memory).
    pub system_info: Map<String, Value>,
    /// Capacity ceiling for concurrent jobs.
    pub max_concurrent_jobs: u32,
    /// Currently assigned jobs.
    pub current_jobs: u32,
    /// Runner agent version string.
    pub version: String,
    /// Creation time.
    pub created_at: Timestamp,
}

impl Runner {
    /// Returns true when the runner can accept one more job.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self.status, RunnerStatus::Online)
            && self.current_jobs < self.max_concurrent_jobs
    }

    /// Returns true when the runner carries every required label.
    #[must_use]
    pub fn matches_labels(&self, required: &[String]) -> bool {
        required
            .iter()
            .all(|label| self.labels.iter().any(|have| have == label))
    }

    /// Returns true when the runner may serve jobs of the given tenant.
    #[must_use]
    pub fn serves_tenant(&self, tenant_id: TenantId) -> bool {
        match self.runner_type {
            RunnerType::Shared => true,
            RunnerType::Dedicated | RunnerType::SelfHosted => self.tenant_id == Some(tenant_id),
        }
    }

    /// Returns true when the runner is silent past the offline threshold.
    #[must_use]
    pub fn is_stale(&self, now: Timestamp, threshold_seconds: i64) -> bool {
        self.last_heartbeat
            .is_none_or(|beat| now.seconds_since(beat) > threshold_seconds)
    }
}
