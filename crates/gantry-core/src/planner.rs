// crates/gantry-core/src/planner.rs
// ============================================================================
// Module: Execution Planner Core
// Description: Pure expansion of a workflow spec into an execution plan.
// Purpose: Produce the job instances and admission decision the store commits.
// Dependencies: crate::{core, matrix}, serde, serde_json
// ============================================================================

//! ## Overview
//! Planning is split in two: this module is the pure half that expands a
//! frozen workflow spec into concrete job instances (matrix expansion,
//! display names, steps copied in declaration order) and decides
//! concurrency-group admission. The store commits the plan atomically:
//! number allocation, record insertion, group admission, and the
//! execution-ready work item land in one transaction (outbox pattern).

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
use crate::core::identifiers::JobKey;
use crate::core::identifiers::PipelineId;
use crate::core::identifiers::TenantId;
use crate::core::identifiers::UserId;
use crate::core::status::TriggerType;
use crate::core::workflow::ContainerSpec;
use crate::core::workflow::ServiceSpec;
use crate::core::workflow::StepSpec;
use crate::core::workflow::WorkflowSpec;
use crate::matrix::display_name;
use crate::matrix::expand_strategy;

// ============================================================================
// SECTION: Plan Records
// ============================================================================

/// One planned job instance, ready to persist.
///
/// # Invariants
/// - `steps` preserves workflow declaration order.
/// - `matrix_values` is empty for non-matrix jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedJob {
    /// Workflow job key.
    pub job_key: JobKey,
    /// Display name (matrix values composed in declaration order).
    pub name: String,
    /// Job keys this instance depends on.
    pub needs: Vec<JobKey>,
    /// `if` condition expression.
    pub condition: String,
    /// Matrix values for this instance, as a JSON object.
    pub matrix_values: Map<String, Value>,
    /// Required runner labels.
    pub runs_on: Vec<String>,
    /// Container configuration, when any.
    pub container: Option<ContainerSpec>,
    /// Service containers.
    pub services: Vec<ServiceSpec>,
    /// Job environment merged over the workflow environment.
    pub environment: Map<String, Value>,
    /// Matrix `fail_fast` flag of the owning strategy.
    pub fail_fast: bool,
    /// Timeout budget in minutes.
    pub timeout_minutes: u32,
    /// Steps in declaration order.
    pub steps: Vec<StepSpec>,
}

/// A complete execution plan awaiting atomic commit.
///
/// # Invariants
/// - `jobs` preserves workflow declaration order, matrix instances in
///   expansion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning pipeline.
    pub pipeline_id: PipelineId,
    /// Frozen configuration reference.
    pub config_id: Option<ConfigId>,
    /// What caused the execution.
    pub trigger_type: TriggerType,
    /// Frozen trigger metadata.
    pub trigger_info: Map<String, Value>,
    /// Inputs for `workflow_dispatch` triggers.
    pub inputs: Map<String, Value>,
    /// Concurrency group key (empty when uncontrolled).
    pub concurrency_group: ConcurrencyGroup,
    /// Cancel older in-flight executions in the same group.
    pub cancel_in_progress: bool,
    /// User who triggered the run, for manual and API triggers.
    pub triggered_by: Option<UserId>,
    /// Planned job instances.
    pub jobs: Vec<PlannedJob>,
}

// ============================================================================
// SECTION: Job Expansion
// ============================================================================

/// Expands a workflow spec into planned job instances.
///
/// Each declared job expands through its matrix strategy; every instance
/// copies the job's steps in declaration order and carries a concrete
/// `matrix_values` object.
#[must_use]
pub fn plan_jobs(spec: &WorkflowSpec) -> Vec<PlannedJob> {
    let workflow_env = &spec.env;
    let mut planned = Vec::new();

    for job in &spec.jobs {
        let fail_fast = job
            .strategy
            .as_ref()
            .is_none_or(|strategy| strategy.fail_fast);
        for combination in expand_strategy(job.strategy.as_ref()) {
            let mut environment = Map::new();
            for (key, value) in workflow_env {
                environment.insert(key.clone(), Value::String(value.clone()));
            }
            for (key, value) in &job.env {
                environment.insert(key.clone(), Value::String(value.clone()));
            }

            let mut matrix_values = Map::new();
            for (key, value) in &combination {
                matrix_values.insert(key.clone(), value.clone());
            }

            planned.push(PlannedJob {
                job_key: job.key.clone(),
                name: display_name(&job.name, &combination),
                needs: job.needs.clone(),
                condition: job.condition.clone(),
                matrix_values,
                runs_on: job.runs_on.clone(),
                container: job.container.clone(),
                services: job.services.clone(),
                environment,
                fail_fast,
                timeout_minutes: job.timeout_minutes,
                steps: job.steps.clone(),
            });
        }
    }

    planned
}

/// Builds a full execution plan from a spec and trigger context.
#[must_use]
#[allow(
    clippy::too_many_arguments,
    reason = "Plan construction mirrors the execution record's trigger fields."
)]
pub fn build_plan(
    spec: &WorkflowSpec,
    tenant_id: TenantId,
    pipeline_id: PipelineId,
    config_id: Option<ConfigId>,
    trigger_type: TriggerType,
    trigger_info: Map<String, Value>,
    inputs: Map<String, Value>,
    triggered_by: Option<UserId>,
) -> ExecutionPlan {
    let (concurrency_group, cancel_in_progress) = spec.concurrency.as_ref().map_or_else(
        || (ConcurrencyGroup::new(""), false),
        |concurrency| {
            (
                ConcurrencyGroup::new(concurrency.group.clone()),
                concurrency.cancel_in_progress,
            )
        },
    );

    ExecutionPlan {
        tenant_id,
        pipeline_id,
        config_id,
        trigger_type,
        trigger_info,
        inputs,
        concurrency_group,
        cancel_in_progress,
        triggered_by,
        jobs: plan_jobs(spec),
    }
}

// ============================================================================
// SECTION: Concurrency Admission
// ============================================================================

/// Admission outcome for a plan entering a concurrency group.
///
/// # Invariants
/// - `cancel` is empty unless the plan requested `cancel_in_progress`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAdmission {
    /// Older executions to cancel before admitting the new one.
    pub cancel: Vec<ExecutionId>,
}

/// Decides group admission given the non-terminal executions already in the
/// group.
///
/// With `cancel_in_progress` the older executions are cancelled; otherwise
/// the new execution simply queues behind them (the scheduler keeps at most
/// one running).
#[must_use]
pub fn admit_to_group(cancel_in_progress: bool, in_flight: &[ExecutionId]) -> GroupAdmission {
    if cancel_in_progress {
        GroupAdmission {
            cancel: in_flight.to_vec(),
        }
    } else {
        GroupAdmission { cancel: Vec::new() }
    }
}
