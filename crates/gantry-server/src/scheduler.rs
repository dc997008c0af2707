// crates/gantry-server/src/scheduler.rs
// ============================================================================
// Module: Runner Scheduler
// Description: Readiness evaluation, runner selection, and dispatch.
// Purpose: Drive jobs from pending through dispatch with at-most-once claims.
// Dependencies: gantry-core, tracing, crate::{bus, protocol, registry, secrets}
// ============================================================================

//! ## Overview
//! The scheduler owns the path from "execution ready" to "job assigned".
//! A job queues when every dependency succeeded and skips when any upstream
//! failed. Among assignable runners (label superset, tenant match or
//! shared, online, spare capacity, live session) the one with the fewest
//! running jobs wins, most recent heartbeat breaking ties. The store claim
//! and the session send are paired: a send that fails after a successful
//! claim rolls the claim back, so assignment is at-most-once. Re-scans run
//! whenever capacity can have changed: job completion, a heartbeat that
//! flips a runner online, a new session, and the periodic sweeps.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use gantry_core::ControlPlaneStore;
use gantry_core::Execution;
use gantry_core::Job;
use gantry_core::JobId;
use gantry_core::RunStatus;
use gantry_core::Runner;
use gantry_core::RunnerId;
use gantry_core::RunnerStatus;
use gantry_core::StoreError;
use gantry_core::Timestamp;
use gantry_core::graph;
use serde_json::Map;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::bus::EntityKind;
use crate::bus::LogBus;
use crate::protocol::JobAssignmentPayload;
use crate::protocol::ServerFrame;
use crate::registry::RunnerRegistry;
use crate::secrets::SecretCipher;

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// Scheduler wiring storage, live sessions, the bus, and the secrets
/// cipher.
///
/// # Invariants
/// - Every claim pairs with exactly one decrement: on completion, on
///   rollback, or in the disconnection sweep.
pub struct Scheduler {
    /// Authoritative storage.
    store: Arc<dyn ControlPlaneStore>,
    /// Live session registry.
    registry: Arc<RunnerRegistry>,
    /// Log fan-out bus.
    bus: Arc<LogBus>,
    /// Secrets cipher for assignment materialization.
    cipher: Arc<SecretCipher>,
    /// Offline threshold in seconds.
    offline_threshold_secs: i64,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("offline_threshold_secs", &self.offline_threshold_secs)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler.
    #[must_use]
    pub fn new(
        store: Arc<dyn ControlPlaneStore>,
        registry: Arc<RunnerRegistry>,
        bus: Arc<LogBus>,
        cipher: Arc<SecretCipher>,
        offline_threshold_secs: i64,
    ) -> Self {
        Self {
            store,
            registry,
            bus,
            cipher,
            offline_threshold_secs,
        }
    }

    // ------------------------------------------------------------------
    // Ready-queue processing
    // ------------------------------------------------------------------

    /// Drains the execution-ready outbox and schedules each execution.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when storage fails.
    pub fn process_ready_queue(&self, now: Timestamp) -> Result<(), StoreError> {
        while let Some(execution_id) = self.store.dequeue_ready()? {
            self.schedule_execution(execution_id, now)?;
        }
        Ok(())
    }

    /// Evaluates one execution: skips blocked jobs, queues ready ones, and
    /// dispatches.
    ///
    /// A non-empty concurrency group admits at most one execution at a
    /// time: a younger member holds in `pending` until every older member
    /// is terminal, and completion wakes the next member in number order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when storage fails.
    pub fn schedule_execution(
        &self,
        execution_id: gantry_core::ExecutionId,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let Some(execution) = self.store.execution(execution_id)? else {
            return Ok(());
        };
        if execution.status.is_terminal() {
            return Ok(());
        }
        if self.held_by_group(&execution)? {
            debug!(
                execution = execution.id.get(),
                group = execution.concurrency_group.as_str(),
                "execution held behind its concurrency group"
            );
            return Ok(());
        }
        if execution.status == RunStatus::Pending {
            self.store
                .update_execution_status(execution_id, RunStatus::Queued, now)?;
        }

        self.evaluate_jobs(&execution, now)?;
        self.dispatch_queued(now)?;
        Ok(())
    }

    /// Returns true when an older group member is still in flight.
    fn held_by_group(&self, execution: &Execution) -> Result<bool, StoreError> {
        if execution.concurrency_group.is_empty() {
            return Ok(false);
        }
        let in_flight = self
            .store
            .executions_in_group(execution.pipeline_id, &execution.concurrency_group)?;
        Ok(in_flight
            .iter()
            .any(|other| other.number < execution.number))
    }

    /// Wakes the oldest held member of a finished execution's group.
    fn wake_group_successor(
        &self,
        execution_id: gantry_core::ExecutionId,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let Some(execution) = self.store.execution(execution_id)? else {
            return Ok(());
        };
        if execution.concurrency_group.is_empty() || !execution.status.is_terminal() {
            return Ok(());
        }
        let successor = self
            .store
            .executions_in_group(execution.pipeline_id, &execution.concurrency_group)?
            .into_iter()
            .min_by_key(|member| member.number);
        if let Some(successor) = successor {
            self.schedule_execution(successor.id, now)?;
        }
        Ok(())
    }

    /// Applies skip propagation and readiness to an execution's jobs.
    fn evaluate_jobs(&self, execution: &Execution, now: Timestamp) -> Result<(), StoreError> {
        let jobs = self.store.jobs_for_execution(execution.id)?;

        for job_id in statically_skipped(&jobs) {
            if self
                .store
                .update_job_status(job_id, RunStatus::Skipped, None, now)?
                .is_some()
            {
                self.bus.publish_status(
                    execution.id,
                    EntityKind::Job,
                    job_id.get(),
                    RunStatus::Skipped,
                    now,
                );
            }
        }

        // Skips propagate down the chain, so run to a fixpoint.
        loop {
            let jobs = self.store.jobs_for_execution(execution.id)?;
            let skippable = graph::skippable_jobs(&jobs);
            if skippable.is_empty() {
                break;
            }
            for job_id in skippable {
                if let Some(job) =
                    self.store
                        .update_job_status(job_id, RunStatus::Skipped, None, now)?
                {
                    debug!(job = %job.name, "skipping job after upstream outcome");
                    self.bus.publish_status(
                        execution.id,
                        EntityKind::Job,
                        job_id.get(),
                        RunStatus::Skipped,
                        now,
                    );
                }
            }
        }

        let jobs = self.store.jobs_for_execution(execution.id)?;
        for job_id in graph::ready_jobs(&jobs) {
            self.store.mark_job_queued(job_id, now)?;
        }

        self.finalize_execution(execution.id, now)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Attempts to dispatch every queued job.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when storage fails.
    pub fn dispatch_queued(&self, now: Timestamp) -> Result<(), StoreError> {
        for job in self.store.queued_jobs()? {
            let Some(execution) = self.store.execution(job.execution_id)? else {
                continue;
            };
            if execution.status.is_terminal() {
                continue;
            }
            self.try_dispatch(&execution, &job, now)?;
        }
        Ok(())
    }

    /// Attempts to dispatch one queued job, honoring at-most-once claims.
    fn try_dispatch(
        &self,
        execution: &Execution,
        job: &Job,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let candidates = self.store.candidate_runners(execution.tenant_id)?;
        let Some(runner) = self.select_runner(&candidates, job) else {
            debug!(job = %job.name, "no assignable runner, job stays queued");
            return Ok(());
        };

        if !self.store.claim_job(job.id, runner.id, now)? {
            // Another scheduler won the race; nothing to roll back.
            return Ok(());
        }

        let payload = self.assignment_payload(execution, job)?;
        let delivered = self
            .registry
            .send_to(runner.id, ServerFrame::JobAssignment { job: payload });
        if delivered {
            info!(job = %job.name, runner = %runner.name, "job dispatched");
        } else {
            // The session vanished between selection and send.
            warn!(job = %job.name, runner = %runner.name, "session gone, rolling back claim");
            self.store.release_job(job.id, runner.id)?;
        }
        Ok(())
    }

    /// Selects the runner with the fewest running jobs; the most recent
    /// heartbeat breaks ties.
    fn select_runner<'a>(&self, candidates: &'a [Runner], job: &Job) -> Option<&'a Runner> {
        candidates
            .iter()
            .filter(|runner| runner.status != RunnerStatus::Maintenance)
            .filter(|runner| runner.is_available())
            .filter(|runner| runner.matches_labels(&job.runs_on))
            .filter(|runner| self.registry.is_connected(runner.id))
            .min_by_key(|runner| {
                (
                    runner.current_jobs,
                    std::cmp::Reverse(
                        runner
                            .last_heartbeat
                            .map_or(i64::MIN, Timestamp::as_unix_millis),
                    ),
                )
            })
    }

    /// Builds an assignment payload with materialized secrets.
    fn assignment_payload(
        &self,
        execution: &Execution,
        job: &Job,
    ) -> Result<JobAssignmentPayload, StoreError> {
        let steps = self.store.steps_for_job(job.id)?;
        let secrets = self
            .store
            .secrets_for_pipeline(execution.tenant_id, execution.pipeline_id)?;
        Ok(JobAssignmentPayload {
            id: job.id,
            name: job.name.clone(),
            steps,
            env: job.environment.clone(),
            container: job.container.clone(),
            services: job.services.clone(),
            secrets: self.cipher.materialize(execution.tenant_id, &secrets),
            timeout_minutes: job.timeout_minutes,
        })
    }

    // ------------------------------------------------------------------
    // Completion handling
    // ------------------------------------------------------------------

    /// Reacts to a job entering a terminal state: fail-fast siblings, skip
    /// propagation, readiness re-evaluation, and execution aggregation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when storage fails.
    pub fn on_job_finished(&self, job: &Job, now: Timestamp) -> Result<(), StoreError> {
        let Some(execution) = self.store.execution(job.execution_id)? else {
            return Ok(());
        };

        if job.status == RunStatus::Failed && self.fail_fast_for(&execution, job)? {
            let jobs = self.store.jobs_for_execution(execution.id)?;
            for sibling_id in graph::fail_fast_siblings(job, &jobs) {
                if self
                    .store
                    .update_job_status(sibling_id, RunStatus::Cancelled, None, now)?
                    .is_some()
                {
                    self.bus.publish_status(
                        execution.id,
                        EntityKind::Job,
                        sibling_id.get(),
                        RunStatus::Cancelled,
                        now,
                    );
                }
            }
        }

        self.evaluate_jobs(&execution, now)?;
        self.dispatch_queued(now)?;
        Ok(())
    }

    /// Looks up the frozen strategy's fail-fast flag for a job's key.
    fn fail_fast_for(&self, execution: &Execution, job: &Job) -> Result<bool, StoreError> {
        let Some(config_id) = execution.config_id else {
            return Ok(false);
        };
        let Some(config) = self.store.config(config_id)? else {
            return Ok(false);
        };
        let Some(spec) = config.parsed else {
            return Ok(false);
        };
        Ok(spec
            .job(&job.job_key)
            .and_then(|job_spec| job_spec.strategy.as_ref())
            .is_some_and(|strategy| strategy.fail_fast))
    }

    /// Writes the aggregated execution status once every job is terminal.
    fn finalize_execution(
        &self,
        execution_id: gantry_core::ExecutionId,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let jobs = self.store.jobs_for_execution(execution_id)?;
        if jobs.is_empty() {
            return Ok(());
        }
        if let Some(aggregate) = graph::aggregate_status(&jobs) {
            self.store
                .update_execution_status(execution_id, aggregate, now)?;
            self.bus.publish_status(
                execution_id,
                EntityKind::Execution,
                execution_id.get(),
                aggregate,
                now,
            );
            self.wake_group_successor(execution_id, now)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Cancellation and sweeps
    // ------------------------------------------------------------------

    /// Cancels an execution: terminal transition, job cancellation, and
    /// `job_cancel` frames to assigned runners. The control plane does not
    /// wait for runner acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when storage fails.
    pub fn cancel_execution(
        &self,
        execution_id: gantry_core::ExecutionId,
        now: Timestamp,
    ) -> Result<usize, StoreError> {
        let cancelled = self.store.cancel_execution(execution_id, now)?;
        for item in &cancelled {
            self.bus.publish_status(
                execution_id,
                EntityKind::Job,
                item.job_id.get(),
                RunStatus::Cancelled,
                now,
            );
            if let Some(runner_id) = item.runner_id {
                let _ = self.registry.send_to(
                    runner_id,
                    ServerFrame::JobCancel {
                        job_id: item.job_id,
                    },
                );
            }
        }
        self.bus.publish_status(
            execution_id,
            EntityKind::Execution,
            execution_id.get(),
            RunStatus::Cancelled,
            now,
        );
        self.wake_group_successor(execution_id, now)?;
        Ok(cancelled.len())
    }

    /// Marks silent runners offline and requeues their in-flight jobs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when storage fails.
    pub fn sweep_offline(&self, now: Timestamp) -> Result<(), StoreError> {
        for runner in self.store.stale_runners(now, self.offline_threshold_secs)? {
            warn!(runner = %runner.name, "runner silent past threshold, marking offline");
            self.store
                .set_runner_status(runner.id, RunnerStatus::Offline)?;
            self.handle_disconnect(runner.id, now)?;
        }
        Ok(())
    }

    /// Requeues a disconnected runner's jobs and re-evaluates their
    /// executions. Session teardown and the offline sweep share this path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when storage fails.
    pub fn handle_disconnect(
        &self,
        runner_id: RunnerId,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let requeued = self.store.requeue_runner_jobs(runner_id, now)?;
        let mut executions = Vec::new();
        for job_id in requeued {
            if let Some(job) = self.store.job(job_id)?
                && !executions.contains(&job.execution_id)
            {
                executions.push(job.execution_id);
            }
        }
        for execution_id in executions {
            self.schedule_execution(execution_id, now)?;
        }
        Ok(())
    }

    /// Times out running jobs past their budget and cancels them on the
    /// runner.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when storage fails.
    pub fn sweep_timeouts(&self, now: Timestamp) -> Result<(), StoreError> {
        for job in self.store.running_jobs()? {
            if !job.timed_out_at(now) {
                continue;
            }
            warn!(job = %job.name, "job exceeded its timeout budget");
            let Some(finished) =
                self.store
                    .finish_job(job.id, RunStatus::Timeout, Map::new(), now)?
            else {
                continue;
            };
            self.bus.publish_status(
                job.execution_id,
                EntityKind::Job,
                job.id.get(),
                RunStatus::Timeout,
                now,
            );
            if let Some(runner_id) = job.runner_id {
                let _ = self
                    .registry
                    .send_to(runner_id, ServerFrame::JobCancel { job_id: job.id });
            }
            self.on_job_finished(&finished, now)?;
        }
        Ok(())
    }

    /// Dispatch hook for capacity increases (new session, online flip).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when storage fails.
    pub fn on_capacity_available(&self, now: Timestamp) -> Result<(), StoreError> {
        self.dispatch_queued(now)
    }
}

/// Marks the pending jobs skipped by a false condition.
///
/// Condition evaluation itself happens runner-side for `run` expressions;
/// the control plane only short-circuits the statically false literal.
#[must_use]
pub fn condition_is_statically_false(condition: &str) -> bool {
    matches!(condition.trim(), "false" | "${{ false }}")
}

/// Job identifiers of an execution whose conditions are statically false.
#[must_use]
pub fn statically_skipped(jobs: &[Job]) -> Vec<JobId> {
    jobs.iter()
        .filter(|job| job.status == RunStatus::Pending)
        .filter(|job| condition_is_statically_false(&job.condition))
        .map(|job| job.id)
        .collect()
}
