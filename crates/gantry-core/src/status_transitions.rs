// crates/gantry-core/src/status_transitions.rs
// ============================================================================
// Module: Status Transition Rules
// Description: Shared mutation rules for execution, job, and step statuses.
// Purpose: Keep timing-field bookkeeping identical across store backends.
// Dependencies: crate::core::{execution, status, time}, serde_json
// ============================================================================

//! ## Overview
//! Both store backends funnel status writes through these helpers so the
//! lifecycle invariants hold everywhere: terminal states absorb further
//! transitions, `queued_at`/`started_at` are written once, and `finished_at`
//! is written exactly when a terminal state is entered.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

use crate::core::execution::Execution;
use crate::core::execution::Job;
use crate::core::execution::Step;
use crate::core::status::RunStatus;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Transition Application
// ============================================================================

/// Applies a status transition to an execution.
///
/// Terminal current states absorb the write.
pub fn apply_execution_transition(execution: &mut Execution, status: RunStatus, now: Timestamp) {
    if execution.status.is_terminal() {
        return;
    }
    execution.status = status;
    match status {
        RunStatus::Queued => {
            if execution.queued_at.is_none() {
                execution.queued_at = Some(now);
            }
        }
        RunStatus::Running => {
            if execution.started_at.is_none() {
                execution.started_at = Some(now);
            }
        }
        _ if status.is_terminal() => {
            execution.finished_at = Some(now);
        }
        _ => {}
    }
}

/// Applies a status transition to a job, merging reported outputs on
/// terminal entry.
pub fn apply_job_transition(
    job: &mut Job,
    status: RunStatus,
    outputs: Option<Map<String, Value>>,
    now: Timestamp,
) {
    if job.status.is_terminal() {
        return;
    }
    job.status = status;
    match status {
        RunStatus::Queued => {
            if job.queued_at.is_none() {
                job.queued_at = Some(now);
            }
        }
        RunStatus::Running => {
            if job.started_at.is_none() {
                job.started_at = Some(now);
            }
        }
        _ if status.is_terminal() => {
            job.finished_at = Some(now);
            if let Some(outputs) = outputs {
                job.outputs = outputs;
            }
        }
        _ => {}
    }
}

/// Applies a status transition to a step, recording the exit code when
/// reported.
pub fn apply_step_transition(
    step: &mut Step,
    status: RunStatus,
    exit_code: Option<i32>,
    outputs: Option<Map<String, Value>>,
    now: Timestamp,
) {
    if step.status.is_terminal() {
        return;
    }
    step.status = status;
    if let Some(code) = exit_code {
        step.exit_code = Some(code);
    }
    match status {
        RunStatus::Running => {
            if step.started_at.is_none() {
                step.started_at = Some(now);
            }
        }
        _ if status.is_terminal() => {
            step.finished_at = Some(now);
            if let Some(outputs) = outputs {
                step.outputs = outputs;
            }
        }
        _ => {}
    }
}
