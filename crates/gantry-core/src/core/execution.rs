// crates/gantry-core/src/core/execution.rs
// ============================================================================
// Module: Execution Records
// Description: Execution, job, step, and log-chunk entities.
// Purpose: Capture one pipeline run and its DAG of work for replay and audit.
// Dependencies: crate::core::{identifiers, status, time, workflow}, serde, serde_json
// ============================================================================

//! ## Overview
//! An execution is one run of a pipeline at a frozen configuration version.
//! It owns an acyclic graph of jobs keyed by workflow job keys; each job owns
//! ordered steps, and each step owns ordered log chunks. Status transitions
//! follow [`crate::core::status::RunStatus`]; `finished_at` is written exactly
//! when a terminal state is entered.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::ConcurrencyGroup;
use crate::core::identifiers::ConfigId;
use crate::core::identifiers::ExecutionId;
use crate::core::identifiers::JobId;
use crate::core::identifiers::JobKey;
use crate::core::identifiers::PipelineId;
use crate::core::identifiers::RunnerId;
use crate::core::identifiers::StepId;
use crate::core::identifiers::TenantId;
use crate::core::identifiers::UserId;
use crate::core::status::LogLevel;
use crate::core::status::RunStatus;
use crate::core::status::StepType;
use crate::core::status::TriggerType;
use crate::core::time::Timestamp;
use crate::core::workflow::ContainerSpec;
use crate::core::workflow::ServiceSpec;

// ============================================================================
// SECTION: Execution Record
// ============================================================================

/// Execution entity: one run of a pipeline.
///
/// # Invariants
/// - `(pipeline_id, number)` is unique; numbers increase monotonically.
/// - `config_id` freezes the configuration that drove the run; it nulls out
///   (rather than cascading) when the config row is deleted.
/// - `finished_at` is set exactly when `status` becomes terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Execution identifier.
    pub id: ExecutionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning pipeline.
    pub pipeline_id: PipelineId,
    /// Frozen configuration reference.
    pub config_id: Option<ConfigId>,
    /// Per-pipeline monotonic execution number, 1-based.
    pub number: u64,
    /// What caused this execution.
    pub trigger_type: TriggerType,
    /// Frozen trigger metadata (event payload subset, manual user, etc.).
    pub trigger_info: Map<String, Value>,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Time the execution was admitted to the queue.
    pub queued_at: Option<Timestamp>,
    /// Time the first job started running.
    pub started_at: Option<Timestamp>,
    /// Time a terminal state was entered.
    pub finished_at: Option<Timestamp>,
    /// Execution-level environment variables.
    pub environment: Map<String, Value>,
    /// Inputs for `workflow_dispatch` triggers.
    pub inputs: Map<String, Value>,
    /// Concurrency group key (empty when uncontrolled).
    pub concurrency_group: ConcurrencyGroup,
    /// Cancel older in-flight executions in the same group.
    pub cancel_in_progress: bool,
    /// User who triggered the run, for manual and API triggers.
    pub triggered_by: Option<UserId>,
    /// Creation time.
    pub created_at: Timestamp,
}

impl Execution {
    /// Returns the run duration in fractional seconds, when finished.
    #[must_use]
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some(finished.span_seconds(started)),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Job Record
// ============================================================================

/// Job entity: one vertex of the execution DAG.
///
/// # Invariants
/// - Every key in `needs` references another job of the same execution.
/// - `runner_id` nulls out when the runner is deleted.
/// - `finished_at` is set exactly when `status` becomes terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier.
    pub id: JobId,
    /// Owning execution.
    pub execution_id: ExecutionId,
    /// Display name (matrix instances carry composed names).
    pub name: String,
    /// Workflow job key this instance came from.
    pub job_key: JobKey,
    /// Job keys this job depends on.
    pub needs: Vec<JobKey>,
    /// `if` condition expression (empty when absent).
    pub condition: String,
    /// Matrix variable values for this instance (empty map when no matrix).
    pub matrix_values: Map<String, Value>,
    /// Required runner labels.
    pub runs_on: Vec<String>,
    /// Container configuration, when any.
    pub container: Option<ContainerSpec>,
    /// Service containers.
    pub services: Vec<ServiceSpec>,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Assigned runner, when dispatched.
    pub runner_id: Option<RunnerId>,
    /// Timeout budget in minutes.
    pub timeout_minutes: u32,
    /// Job outputs reported by the runner.
    pub outputs: Map<String, Value>,
    /// Job-level environment variables.
    pub environment: Map<String, Value>,
    /// Time the job was admitted to the queue.
    pub queued_at: Option<Timestamp>,
    /// Time the job started running.
    pub started_at: Option<Timestamp>,
    /// Time a terminal state was entered.
    pub finished_at: Option<Timestamp>,
    /// Creation time.
    pub created_at: Timestamp,
}

impl Job {
    /// Returns the job duration in fractional seconds, when finished.
    #[must_use]
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some(finished.span_seconds(started)),
            _ => None,
        }
    }

    /// Returns true when the running job has exceeded its timeout budget.
    #[must_use]
    pub fn timed_out_at(&self, now: Timestamp) -> bool {
        self.status == RunStatus::Running
            && self.started_at.is_some_and(|started| {
                now.seconds_since(started) > i64::from(self.timeout_minutes) * 60
            })
    }
}

// ============================================================================
// SECTION: Step Record
// ============================================================================

/// Step entity: one sequential unit within a job.
///
/// # Invariants
/// - `(job_id, order)` is unique; `order` is the 0-based declaration index.
/// - Exactly one of `run_command`/`uses_action` is non-empty, matching
///   `step_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step identifier.
    pub id: StepId,
    /// Owning job.
    pub job_id: JobId,
    /// Display name.
    pub name: String,
    /// 0-based declaration index within the job.
    pub order: u32,
    /// Whether the step runs a command or uses an action.
    pub step_type: StepType,
    /// Shell command (empty for `uses` steps).
    pub run_command: String,
    /// Action reference (empty for `run` steps).
    pub uses_action: String,
    /// Action inputs (`with`).
    pub with_inputs: Map<String, Value>,
    /// Shell for `run` steps.
    pub shell: String,
    /// Working directory (empty when absent).
    pub working_directory: String,
    /// Step-level environment variables.
    pub env: Map<String, Value>,
    /// `if` condition expression (empty when absent).
    pub condition: String,
    /// Continue the job when this step fails.
    pub continue_on_error: bool,
    /// Timeout budget in minutes.
    pub timeout_minutes: u32,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Process exit code, when reported.
    pub exit_code: Option<i32>,
    /// Time the step started running.
    pub started_at: Option<Timestamp>,
    /// Time a terminal state was entered.
    pub finished_at: Option<Timestamp>,
    /// Step outputs reported by the runner.
    pub outputs: Map<String, Value>,
}

impl Step {
    /// Returns the step duration in fractional seconds, when finished.
    #[must_use]
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some(finished.span_seconds(started)),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Log Chunks
// ============================================================================

/// One stored chunk of step output.
///
/// # Invariants
/// - `(step_id, chunk_number)` is unique; numbers increase by one with no
///   gaps within a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogChunk {
    /// Owning step.
    pub step_id: StepId,
    /// Monotonic chunk number within the step, 0-based.
    pub chunk_number: u64,
    /// Chunk text.
    pub content: String,
    /// Severity level.
    pub level: LogLevel,
    /// Runner-reported timestamp.
    pub timestamp: Timestamp,
}
