// crates/gantry-server/src/planner.rs
// ============================================================================
// Module: Execution Launcher
// Description: Orchestration around atomic plan commits.
// Purpose: Freeze trigger context, commit plans, and emit admission effects.
// Dependencies: gantry-core, serde_json, tracing, crate::{bus, protocol, registry, scheduler}
// ============================================================================

//! ## Overview
//! The launcher is the impure half of the planner: it freezes the trigger
//! metadata, builds the pure plan from the frozen configuration, commits it
//! through the store in one transaction (numbering, jobs, steps, group
//! admission, outbox), and then emits the side effects admission produced:
//! `job_cancel` frames to runners whose jobs were cancelled by
//! `cancel_in_progress`, and status frames to subscribers. The launcher
//! never dispatches jobs itself; the scheduler drains the outbox.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use gantry_core::ControlPlaneStore;
use gantry_core::DeliveryId;
use gantry_core::Execution;
use gantry_core::ExecutionId;
use gantry_core::Pipeline;
use gantry_core::PipelineConfigRecord;
use gantry_core::PullRequestEvent;
use gantry_core::PushEvent;
use gantry_core::RunStatus;
use gantry_core::StoreError;
use gantry_core::Timestamp;
use gantry_core::TriggerType;
use gantry_core::UserId;
use gantry_core::planner::build_plan;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tracing::info;

use crate::bus::EntityKind;
use crate::bus::LogBus;
use crate::protocol::ServerFrame;
use crate::registry::RunnerRegistry;

// ============================================================================
// SECTION: Launcher
// ============================================================================

/// Execution launcher.
pub struct ExecutionLauncher {
    /// Authoritative storage.
    store: Arc<dyn ControlPlaneStore>,
    /// Live session registry for admission cancel frames.
    registry: Arc<RunnerRegistry>,
    /// Log fan-out bus.
    bus: Arc<LogBus>,
}

impl std::fmt::Debug for ExecutionLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionLauncher").finish_non_exhaustive()
    }
}

impl ExecutionLauncher {
    /// Creates a launcher.
    #[must_use]
    pub fn new(
        store: Arc<dyn ControlPlaneStore>,
        registry: Arc<RunnerRegistry>,
        bus: Arc<LogBus>,
    ) -> Self {
        Self {
            store,
            registry,
            bus,
        }
    }

    /// Launches an execution from a frozen configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the plan cannot be committed.
    #[allow(
        clippy::too_many_arguments,
        reason = "Launch parameters mirror the execution record's trigger fields."
    )]
    pub fn launch(
        &self,
        pipeline: &Pipeline,
        config: &PipelineConfigRecord,
        trigger_type: TriggerType,
        trigger_info: Map<String, Value>,
        inputs: Map<String, Value>,
        triggered_by: Option<UserId>,
        now: Timestamp,
    ) -> Result<Option<Execution>, StoreError> {
        let Some(spec) = config.parsed.as_ref() else {
            return Ok(None);
        };
        let plan = build_plan(
            spec,
            pipeline.tenant_id,
            pipeline.id,
            Some(config.id),
            trigger_type,
            trigger_info,
            inputs,
            triggered_by,
        );
        let planned = self.store.commit_plan(&plan, now)?;

        // Admission effects: cancel frames for jobs of older group members.
        for cancelled in &planned.cancelled {
            self.bus.publish_status(
                cancelled.execution_id,
                EntityKind::Job,
                cancelled.job_id.get(),
                RunStatus::Cancelled,
                now,
            );
            if let Some(runner_id) = cancelled.runner_id {
                let _ = self.registry.send_to(
                    runner_id,
                    ServerFrame::JobCancel {
                        job_id: cancelled.job_id,
                    },
                );
            }
        }

        info!(
            pipeline = %pipeline.name,
            number = planned.execution.number,
            trigger = %trigger_type,
            "execution created"
        );
        Ok(Some(planned.execution))
    }

    /// Launches an execution for a matched push event.
    ///
    /// Branch-deletion pushes never create executions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the plan cannot be committed.
    pub fn launch_for_push(
        &self,
        pipeline: &Pipeline,
        config: &PipelineConfigRecord,
        event: &PushEvent,
        delivery_id: Option<&DeliveryId>,
        now: Timestamp,
    ) -> Result<Option<Execution>, StoreError> {
        if event.deleted {
            info!(branch = event.branch(), "skipping execution for deleted ref");
            return Ok(None);
        }
        let mut trigger_info = Map::new();
        trigger_info.insert("event_type".to_string(), json!("push"));
        trigger_info.insert(
            "delivery_id".to_string(),
            json!(delivery_id.map(DeliveryId::as_str)),
        );
        trigger_info.insert("ref".to_string(), json!(event.ref_name));
        trigger_info.insert("branch".to_string(), json!(event.branch()));
        trigger_info.insert("tag".to_string(), json!(event.tag()));
        trigger_info.insert("commit_sha".to_string(), json!(event.commit_sha()));
        trigger_info.insert(
            "commit_message".to_string(),
            json!(
                event
                    .head_commit
                    .as_ref()
                    .map_or("", |commit| commit.message.as_str())
            ),
        );
        trigger_info.insert(
            "author".to_string(),
            json!(
                event
                    .head_commit
                    .as_ref()
                    .map_or("", |commit| commit.author_name.as_str())
            ),
        );
        trigger_info.insert(
            "repository".to_string(),
            json!(event.repository.full_name),
        );
        trigger_info.insert("sender".to_string(), json!(event.sender.login));

        self.launch(
            pipeline,
            config,
            TriggerType::Push,
            trigger_info,
            Map::new(),
            None,
            now,
        )
    }

    /// Launches an execution for a matched pull-request event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the plan cannot be committed.
    pub fn launch_for_pull_request(
        &self,
        pipeline: &Pipeline,
        config: &PipelineConfigRecord,
        event: &PullRequestEvent,
        delivery_id: Option<&DeliveryId>,
        now: Timestamp,
    ) -> Result<Option<Execution>, StoreError> {
        let mut trigger_info = Map::new();
        trigger_info.insert("event_type".to_string(), json!("pull_request"));
        trigger_info.insert(
            "delivery_id".to_string(),
            json!(delivery_id.map(DeliveryId::as_str)),
        );
        trigger_info.insert("action".to_string(), json!(event.action));
        trigger_info.insert("number".to_string(), json!(event.number));
        trigger_info.insert("title".to_string(), json!(event.title));
        trigger_info.insert("head_sha".to_string(), json!(event.head_sha));
        trigger_info.insert("head_branch".to_string(), json!(event.head_branch));
        trigger_info.insert("base_branch".to_string(), json!(event.base_branch));
        trigger_info.insert("head_repo".to_string(), json!(event.head_repo));
        trigger_info.insert("base_repo".to_string(), json!(event.base_repo));
        trigger_info.insert("is_fork".to_string(), json!(event.is_fork()));
        trigger_info.insert(
            "repository".to_string(),
            json!(event.repository.full_name),
        );
        trigger_info.insert("sender".to_string(), json!(event.sender.login));

        self.launch(
            pipeline,
            config,
            TriggerType::PullRequest,
            trigger_info,
            Map::new(),
            None,
            now,
        )
    }

    /// Retries a terminal execution as a fresh one.
    ///
    /// The retry freezes the same configuration version, carries
    /// `retry_of` in its trigger info, and allocates the next execution
    /// number (never reusing pruned numbers).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown executions and
    /// [`StoreError::Invalid`] for non-terminal ones.
    pub fn retry_execution(
        &self,
        execution_id: ExecutionId,
        triggered_by: Option<UserId>,
        now: Timestamp,
    ) -> Result<Execution, StoreError> {
        let Some(previous) = self.store.execution(execution_id)? else {
            return Err(StoreError::NotFound(format!("execution {execution_id}")));
        };
        if !matches!(
            previous.status,
            RunStatus::Failed | RunStatus::Cancelled | RunStatus::Timeout
        ) {
            return Err(StoreError::Invalid(
                "only failed, cancelled, or timed out executions can be retried".to_string(),
            ));
        }
        let Some(config_id) = previous.config_id else {
            return Err(StoreError::Invalid(
                "execution has no frozen configuration to retry".to_string(),
            ));
        };
        let Some(config) = self.store.config(config_id)? else {
            return Err(StoreError::NotFound(format!("config {config_id}")));
        };
        let Some(pipeline) = self
            .store
            .pipeline(previous.tenant_id, previous.pipeline_id)?
        else {
            return Err(StoreError::NotFound(format!(
                "pipeline {}",
                previous.pipeline_id
            )));
        };

        let mut trigger_info = Map::new();
        trigger_info.insert("retry_of".to_string(), json!(execution_id.get()));

        let execution = self.launch(
            &pipeline,
            &config,
            TriggerType::Manual,
            trigger_info,
            previous.inputs.clone(),
            triggered_by,
            now,
        )?;
        execution.ok_or_else(|| {
            StoreError::Invalid("frozen configuration is no longer parseable".to_string())
        })
    }
}
