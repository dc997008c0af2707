// crates/gantry-core/src/store_memory.rs
// ============================================================================
// Module: In-Memory Control-Plane Store
// Description: Reference ControlPlaneStore backed by process memory.
// Purpose: Back unit tests and self-hosted development without a database.
// Dependencies: crate::{core, interfaces, planner}
// ============================================================================

//! ## Overview
//! The in-memory store is the reference implementation of
//! [`ControlPlaneStore`]: one mutex guards all state, so every method is one
//! atomic step and the durable store's transactional semantics are
//! reproduced exactly. It is the fixture used across the workspace's tests
//! and the default backend in self-hosted development mode.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use serde_json::Map;
use serde_json::Value;

use crate::core::artifact::Artifact;
use crate::core::execution::Execution;
use crate::core::execution::Job;
use crate::core::execution::LogChunk;
use crate::core::execution::Step;
use crate::core::identifiers::ApiKeyId;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::ConcurrencyGroup;
use crate::core::identifiers::ConfigId;
use crate::core::identifiers::ExecutionId;
use crate::core::identifiers::JobId;
use crate::core::identifiers::PipelineId;
use crate::core::identifiers::RunnerId;
use crate::core::identifiers::SecretId;
use crate::core::identifiers::StepId;
use crate::core::identifiers::TenantId;
use crate::core::pipeline::Pipeline;
use crate::core::pipeline::PipelineConfigRecord;
use crate::core::runner::Runner;
use crate::core::secret::Secret;
use crate::core::status::LogLevel;
use crate::core::status::RunStatus;
use crate::core::status::RunnerStatus;
use crate::core::tenant::Tenant;
use crate::core::time::Timestamp;
use crate::core::user::ApiKeyRecord;
use crate::core::workflow::StepAction;
use crate::interfaces::CancelledJob;
use crate::interfaces::ControlPlaneStore;
use crate::interfaces::LogRecord;
use crate::interfaces::NewApiKey;
use crate::interfaces::NewArtifact;
use crate::interfaces::NewConfig;
use crate::interfaces::NewPipeline;
use crate::interfaces::NewRunner;
use crate::interfaces::NewSecret;
use crate::interfaces::NewTenant;
use crate::interfaces::PlannedExecution;
use crate::interfaces::StoreError;
use crate::planner::ExecutionPlan;
use crate::status_transitions;

// ============================================================================
// SECTION: State
// ============================================================================

/// Mutable store state behind the mutex.
#[derive(Debug, Default)]
struct State {
    /// Next identifier value, shared across entity kinds for simplicity.
    next_id: u64,
    /// Tenants by identifier.
    tenants: BTreeMap<u64, Tenant>,
    /// Pipelines by identifier.
    pipelines: BTreeMap<u64, Pipeline>,
    /// Configuration versions by identifier.
    configs: BTreeMap<u64, PipelineConfigRecord>,
    /// Executions by identifier.
    executions: BTreeMap<u64, Execution>,
    /// Jobs by identifier.
    jobs: BTreeMap<u64, Job>,
    /// Steps by identifier.
    steps: BTreeMap<u64, Step>,
    /// Log chunks in append order.
    log_chunks: Vec<LogChunk>,
    /// Runners by identifier.
    runners: BTreeMap<u64, Runner>,
    /// Secrets by identifier.
    secrets: BTreeMap<u64, Secret>,
    /// Artifacts by identifier.
    artifacts: BTreeMap<u64, Artifact>,
    /// API keys by identifier.
    api_keys: BTreeMap<u64, ApiKeyRecord>,
    /// Outbox of execution-ready work items.
    work_queue: VecDeque<ExecutionId>,
}

impl State {
    /// Allocates the next 1-based identifier value.
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`ControlPlaneStore`].
///
/// # Invariants
/// - One mutex guards all state; each trait method is one atomic step.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// Guarded state.
    state: Mutex<State>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state, recovering from poisoning (tests may panic while
    /// holding the guard; the data itself stays consistent per method).
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builds a numeric identifier from an allocated raw value.
fn id_from(raw: u64) -> Result<std::num::NonZeroU64, StoreError> {
    std::num::NonZeroU64::new(raw)
        .ok_or_else(|| StoreError::Invalid("allocated identifier was zero".to_string()))
}

// ============================================================================
// SECTION: Store Implementation
// ============================================================================

impl ControlPlaneStore for InMemoryStore {
    fn create_tenant(&self, new: NewTenant, now: Timestamp) -> Result<Tenant, StoreError> {
        let mut state = self.lock();
        if state.tenants.values().any(|tenant| tenant.slug == new.slug) {
            return Err(StoreError::Conflict(format!(
                "tenant slug already exists: {}",
                new.slug
            )));
        }
        let id = TenantId::new(id_from(state.allocate())?);
        let tenant = Tenant {
            id,
            name: new.name,
            slug: new.slug,
            plan: new.plan,
            quotas: new.quotas,
            current_storage_mb: 0,
            active: true,
            created_at: now,
        };
        state.tenants.insert(id.get(), tenant.clone());
        Ok(tenant)
    }

    fn tenant(&self, id: TenantId) -> Result<Option<Tenant>, StoreError> {
        Ok(self.lock().tenants.get(&id.get()).cloned())
    }

    fn tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, StoreError> {
        Ok(self
            .lock()
            .tenants
            .values()
            .find(|tenant| tenant.slug == slug && tenant.active)
            .cloned())
    }

    fn create_pipeline(&self, new: NewPipeline, now: Timestamp) -> Result<Pipeline, StoreError> {
        let mut state = self.lock();
        if state
            .pipelines
            .values()
            .any(|pipeline| pipeline.tenant_id == new.tenant_id && pipeline.slug == new.slug)
        {
            return Err(StoreError::Conflict(format!(
                "pipeline slug already exists: {}",
                new.slug
            )));
        }
        let id = PipelineId::new(id_from(state.allocate())?);
        let pipeline = Pipeline {
            id,
            tenant_id: new.tenant_id,
            name: new.name,
            slug: new.slug,
            repo_url: new.repo_url,
            default_branch: new.default_branch,
            config_path: new.config_path,
            webhook_secret: new.webhook_secret,
            active: true,
            last_execution_at: None,
            created_at: now,
        };
        state.pipelines.insert(id.get(), pipeline.clone());
        Ok(pipeline)
    }

    fn pipeline(
        &self,
        tenant_id: TenantId,
        id: PipelineId,
    ) -> Result<Option<Pipeline>, StoreError> {
        Ok(self
            .lock()
            .pipelines
            .get(&id.get())
            .filter(|pipeline| pipeline.tenant_id == tenant_id)
            .cloned())
    }

    fn pipelines_for_repo(&self, needles: &[String]) -> Result<Vec<Pipeline>, StoreError> {
        let state = self.lock();
        let mut found = Vec::new();
        for pipeline in state.pipelines.values() {
            if !pipeline.active {
                continue;
            }
            if needles
                .iter()
                .any(|needle| !needle.is_empty() && pipeline.repo_url.contains(needle))
                && !found
                    .iter()
                    .any(|existing: &Pipeline| existing.id == pipeline.id)
            {
                found.push(pipeline.clone());
            }
        }
        Ok(found)
    }

    fn touch_pipeline(&self, id: PipelineId, at: Timestamp) -> Result<(), StoreError> {
        let mut state = self.lock();
        let pipeline = state
            .pipelines
            .get_mut(&id.get())
            .ok_or_else(|| StoreError::NotFound(format!("pipeline {id}")))?;
        pipeline.last_execution_at = Some(at);
        Ok(())
    }

    fn insert_config(
        &self,
        new: NewConfig,
        now: Timestamp,
    ) -> Result<PipelineConfigRecord, StoreError> {
        let mut state = self.lock();
        let version = state
            .configs
            .values()
            .filter(|config| config.pipeline_id == new.pipeline_id)
            .map(|config| config.version)
            .max()
            .unwrap_or(0)
            + 1;
        let id = ConfigId::new(id_from(state.allocate())?);
        let record = PipelineConfigRecord {
            id,
            pipeline_id: new.pipeline_id,
            version,
            yaml_raw: new.yaml_raw,
            parsed: new.parsed,
            commit_sha: new.commit_sha,
            is_valid: new.is_valid,
            validation_errors: new.validation_errors,
            created_at: now,
        };
        state.configs.insert(id.get(), record.clone());
        Ok(record)
    }

    fn latest_valid_config(
        &self,
        pipeline_id: PipelineId,
    ) -> Result<Option<PipelineConfigRecord>, StoreError> {
        Ok(self
            .lock()
            .configs
            .values()
            .filter(|config| config.pipeline_id == pipeline_id && config.is_valid)
            .max_by_key(|config| config.version)
            .cloned())
    }

    fn config(&self, id: ConfigId) -> Result<Option<PipelineConfigRecord>, StoreError> {
        Ok(self.lock().configs.get(&id.get()).cloned())
    }

    fn commit_plan(
        &self,
        plan: &ExecutionPlan,
        now: Timestamp,
    ) -> Result<PlannedExecution, StoreError> {
        let mut state = self.lock();

        // Concurrency-group admission before inserting the new execution.
        let mut cancelled = Vec::new();
        if !plan.concurrency_group.is_empty() && plan.cancel_in_progress {
            let older: Vec<u64> = state
                .executions
                .values()
                .filter(|execution| {
                    execution.pipeline_id == plan.pipeline_id
                        && execution.concurrency_group == plan.concurrency_group
                        && !execution.status.is_terminal()
                })
                .map(|execution| execution.id.get())
                .collect();
            for raw in older {
                cancelled.extend(cancel_execution_locked(&mut state, raw, now));
            }
        }

        let number = state
            .executions
            .values()
            .filter(|execution| execution.pipeline_id == plan.pipeline_id)
            .map(|execution| execution.number)
            .max()
            .unwrap_or(0)
            + 1;

        let execution_id = ExecutionId::new(id_from(state.allocate())?);
        let execution = Execution {
            id: execution_id,
            tenant_id: plan.tenant_id,
            pipeline_id: plan.pipeline_id,
            config_id: plan.config_id,
            number,
            trigger_type: plan.trigger_type,
            trigger_info: plan.trigger_info.clone(),
            status: RunStatus::Pending,
            queued_at: None,
            started_at: None,
            finished_at: None,
            environment: Map::new(),
            inputs: plan.inputs.clone(),
            concurrency_group: plan.concurrency_group.clone(),
            cancel_in_progress: plan.cancel_in_progress,
            triggered_by: plan.triggered_by,
            created_at: now,
        };
        state.executions.insert(execution_id.get(), execution.clone());

        let mut jobs = Vec::new();
        for planned in &plan.jobs {
            let job_id = JobId::new(id_from(state.allocate())?);
            let job = Job {
                id: job_id,
                execution_id,
                name: planned.name.clone(),
                job_key: planned.job_key.clone(),
                needs: planned.needs.clone(),
                condition: planned.condition.clone(),
                matrix_values: planned.matrix_values.clone(),
                runs_on: planned.runs_on.clone(),
                container: planned.container.clone(),
                services: planned.services.clone(),
                status: RunStatus::Pending,
                runner_id: None,
                timeout_minutes: planned.timeout_minutes,
                outputs: Map::new(),
                environment: planned.environment.clone(),
                queued_at: None,
                started_at: None,
                finished_at: None,
                created_at: now,
            };
            state.jobs.insert(job_id.get(), job.clone());

            for (index, spec) in planned.steps.iter().enumerate() {
                let step_id = StepId::new(id_from(state.allocate())?);
                let (step_type, run_command, uses_action, with_inputs) = match &spec.action {
                    StepAction::Run { command } => (
                        crate::core::status::StepType::Run,
                        command.clone(),
                        String::new(),
                        Map::new(),
                    ),
                    StepAction::Uses { action, with } => {
                        let mut inputs = Map::new();
                        for (key, value) in with {
                            inputs.insert(key.clone(), value.clone());
                        }
                        (
                            crate::core::status::StepType::Uses,
                            String::new(),
                            action.clone(),
                            inputs,
                        )
                    }
                };
                let mut env = Map::new();
                for (key, value) in &spec.env {
                    env.insert(key.clone(), Value::String(value.clone()));
                }
                let step = Step {
                    id: step_id,
                    job_id,
                    name: spec.name.clone(),
                    order: u32::try_from(index).map_err(|_| {
                        StoreError::Invalid("step order overflows u32".to_string())
                    })?,
                    step_type,
                    run_command,
                    uses_action,
                    with_inputs,
                    shell: spec.shell.clone(),
                    working_directory: spec.working_directory.clone(),
                    env,
                    condition: spec.condition.clone(),
                    continue_on_error: spec.continue_on_error,
                    timeout_minutes: spec.timeout_minutes,
                    status: RunStatus::Pending,
                    exit_code: None,
                    started_at: None,
                    finished_at: None,
                    outputs: Map::new(),
                };
                state.steps.insert(step_id.get(), step);
            }
            jobs.push(job);
        }

        if let Some(pipeline) = state.pipelines.get_mut(&plan.pipeline_id.get()) {
            pipeline.last_execution_at = Some(now);
        }
        state.work_queue.push_back(execution_id);

        Ok(PlannedExecution {
            execution,
            jobs,
            cancelled,
        })
    }

    fn execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError> {
        Ok(self.lock().executions.get(&id.get()).cloned())
    }

    fn update_execution_status(
        &self,
        id: ExecutionId,
        status: RunStatus,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let execution = state
            .executions
            .get_mut(&id.get())
            .ok_or_else(|| StoreError::NotFound(format!("execution {id}")))?;
        status_transitions::apply_execution_transition(execution, status, now);
        Ok(())
    }

    fn cancel_execution(
        &self,
        id: ExecutionId,
        now: Timestamp,
    ) -> Result<Vec<CancelledJob>, StoreError> {
        let mut state = self.lock();
        if !state.executions.contains_key(&id.get()) {
            return Err(StoreError::NotFound(format!("execution {id}")));
        }
        Ok(cancel_execution_locked(&mut state, id.get(), now))
    }

    fn executions_in_group(
        &self,
        pipeline_id: PipelineId,
        group: &ConcurrencyGroup,
    ) -> Result<Vec<Execution>, StoreError> {
        Ok(self
            .lock()
            .executions
            .values()
            .filter(|execution| {
                execution.pipeline_id == pipeline_id
                    && &execution.concurrency_group == group
                    && !execution.status.is_terminal()
            })
            .cloned()
            .collect())
    }

    fn dequeue_ready(&self) -> Result<Option<ExecutionId>, StoreError> {
        Ok(self.lock().work_queue.pop_front())
    }

    fn job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.lock().jobs.get(&id.get()).cloned())
    }

    fn jobs_for_execution(&self, execution_id: ExecutionId) -> Result<Vec<Job>, StoreError> {
        Ok(self
            .lock()
            .jobs
            .values()
            .filter(|job| job.execution_id == execution_id)
            .cloned()
            .collect())
    }

    fn mark_job_queued(&self, id: JobId, now: Timestamp) -> Result<(), StoreError> {
        let mut state = self.lock();
        let job = state
            .jobs
            .get_mut(&id.get())
            .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
        if job.status == RunStatus::Pending {
            job.status = RunStatus::Queued;
            job.queued_at = Some(now);
        }
        Ok(())
    }

    fn claim_job(
        &self,
        job_id: JobId,
        runner_id: RunnerId,
        _now: Timestamp,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(job) = state.jobs.get(&job_id.get()).cloned() else {
            return Err(StoreError::NotFound(format!("job {job_id}")));
        };
        if job.status != RunStatus::Queued || job.runner_id.is_some() {
            return Ok(false);
        }
        let Some(runner) = state.runners.get_mut(&runner_id.get()) else {
            return Err(StoreError::NotFound(format!("runner {runner_id}")));
        };
        runner.current_jobs += 1;
        if let Some(job) = state.jobs.get_mut(&job_id.get()) {
            job.runner_id = Some(runner_id);
        }
        Ok(true)
    }

    fn release_job(&self, job_id: JobId, runner_id: RunnerId) -> Result<(), StoreError> {
        let mut state = self.lock();
        if let Some(job) = state.jobs.get_mut(&job_id.get())
            && job.runner_id == Some(runner_id)
        {
            job.runner_id = None;
        }
        if let Some(runner) = state.runners.get_mut(&runner_id.get()) {
            runner.current_jobs = runner.current_jobs.saturating_sub(1);
        }
        Ok(())
    }

    fn update_job_status(
        &self,
        id: JobId,
        status: RunStatus,
        outputs: Option<Map<String, Value>>,
        now: Timestamp,
    ) -> Result<Option<Job>, StoreError> {
        let mut state = self.lock();
        let Some(job) = state.jobs.get_mut(&id.get()) else {
            return Ok(None);
        };
        status_transitions::apply_job_transition(job, status, outputs, now);
        Ok(Some(job.clone()))
    }

    fn finish_job(
        &self,
        id: JobId,
        status: RunStatus,
        outputs: Map<String, Value>,
        now: Timestamp,
    ) -> Result<Option<Job>, StoreError> {
        let mut state = self.lock();
        let Some(job) = state.jobs.get(&id.get()).cloned() else {
            return Ok(None);
        };
        if job.status.is_terminal() {
            return Ok(Some(job));
        }
        let runner_id = job.runner_id;
        if let Some(job) = state.jobs.get_mut(&id.get()) {
            status_transitions::apply_job_transition(job, status, Some(outputs), now);
        }
        if let Some(runner_id) = runner_id
            && let Some(runner) = state.runners.get_mut(&runner_id.get())
        {
            runner.current_jobs = runner.current_jobs.saturating_sub(1);
        }
        Ok(state.jobs.get(&id.get()).cloned())
    }

    fn requeue_runner_jobs(
        &self,
        runner_id: RunnerId,
        _now: Timestamp,
    ) -> Result<Vec<JobId>, StoreError> {
        let mut state = self.lock();
        let mut requeued = Vec::new();
        let ids: Vec<u64> = state
            .jobs
            .values()
            .filter(|job| job.runner_id == Some(runner_id) && !job.status.is_terminal())
            .map(|job| job.id.get())
            .collect();
        for raw in ids {
            if let Some(job) = state.jobs.get_mut(&raw) {
                job.status = RunStatus::Pending;
                job.runner_id = None;
                job.queued_at = None;
                job.started_at = None;
                requeued.push(job.id);
            }
        }
        if let Some(runner) = state.runners.get_mut(&runner_id.get()) {
            runner.current_jobs = 0;
        }
        Ok(requeued)
    }

    fn running_jobs(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self
            .lock()
            .jobs
            .values()
            .filter(|job| job.status == RunStatus::Running)
            .cloned()
            .collect())
    }

    fn queued_jobs(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self
            .lock()
            .jobs
            .values()
            .filter(|job| job.status == RunStatus::Queued && job.runner_id.is_none())
            .cloned()
            .collect())
    }

    fn step(&self, id: StepId) -> Result<Option<Step>, StoreError> {
        Ok(self.lock().steps.get(&id.get()).cloned())
    }

    fn steps_for_job(&self, job_id: JobId) -> Result<Vec<Step>, StoreError> {
        let mut steps: Vec<Step> = self
            .lock()
            .steps
            .values()
            .filter(|step| step.job_id == job_id)
            .cloned()
            .collect();
        steps.sort_by_key(|step| step.order);
        Ok(steps)
    }

    fn update_step_status(
        &self,
        id: StepId,
        status: RunStatus,
        exit_code: Option<i32>,
        outputs: Option<Map<String, Value>>,
        now: Timestamp,
    ) -> Result<Option<Step>, StoreError> {
        let mut state = self.lock();
        let Some(step) = state.steps.get_mut(&id.get()) else {
            return Ok(None);
        };
        status_transitions::apply_step_transition(step, status, exit_code, outputs, now);
        Ok(Some(step.clone()))
    }

    fn append_log_chunk(
        &self,
        step_id: StepId,
        content: String,
        level: LogLevel,
        timestamp: Timestamp,
    ) -> Result<LogChunk, StoreError> {
        let mut state = self.lock();
        if !state.steps.contains_key(&step_id.get()) {
            return Err(StoreError::NotFound(format!("step {step_id}")));
        }
        let chunk_number = state
            .log_chunks
            .iter()
            .filter(|chunk| chunk.step_id == step_id)
            .map(|chunk| chunk.chunk_number + 1)
            .max()
            .unwrap_or(0);
        let chunk = LogChunk {
            step_id,
            chunk_number,
            content,
            level,
            timestamp,
        };
        state.log_chunks.push(chunk.clone());
        Ok(chunk)
    }

    fn log_backlog(
        &self,
        execution_id: ExecutionId,
        job_id: Option<JobId>,
        limit: usize,
    ) -> Result<Vec<LogRecord>, StoreError> {
        let state = self.lock();
        let job_ids: Vec<JobId> = state
            .jobs
            .values()
            .filter(|job| job.execution_id == execution_id)
            .filter(|job| job_id.is_none_or(|wanted| job.id == wanted))
            .map(|job| job.id)
            .collect();

        let mut records: Vec<(u64, u32, LogRecord)> = Vec::new();
        for chunk in &state.log_chunks {
            let Some(step) = state.steps.get(&chunk.step_id.get()) else {
                continue;
            };
            if !job_ids.contains(&step.job_id) {
                continue;
            }
            records.push((
                step.job_id.get(),
                step.order,
                LogRecord {
                    job_id: step.job_id,
                    chunk: chunk.clone(),
                },
            ));
        }
        records.sort_by(|a, b| {
            (a.0, a.1, a.2.chunk.chunk_number).cmp(&(b.0, b.1, b.2.chunk.chunk_number))
        });
        Ok(records
            .into_iter()
            .take(limit)
            .map(|(_, _, record)| record)
            .collect())
    }

    fn create_runner(&self, new: NewRunner, now: Timestamp) -> Result<Runner, StoreError> {
        let mut state = self.lock();
        if state
            .runners
            .values()
            .any(|runner| runner.token_hash == new.token_hash)
        {
            return Err(StoreError::Conflict(
                "runner token hash already exists".to_string(),
            ));
        }
        let id = RunnerId::new(id_from(state.allocate())?);
        let runner = Runner {
            id,
            tenant_id: new.tenant_id,
            name: new.name,
            token_hash: new.token_hash,
            runner_type: new.runner_type,
            labels: new.labels,
            capabilities: Map::new(),
            status: RunnerStatus::Offline,
            last_heartbeat: None,
            system_info: Map::new(),
            max_concurrent_jobs: new.max_concurrent_jobs,
            current_jobs: 0,
            version: new.version,
            created_at: now,
        };
        state.runners.insert(id.get(), runner.clone());
        Ok(runner)
    }

    fn runner(&self, id: RunnerId) -> Result<Option<Runner>, StoreError> {
        Ok(self.lock().runners.get(&id.get()).cloned())
    }

    fn update_runner_heartbeat(
        &self,
        id: RunnerId,
        system_info: Map<String, Value>,
        current_jobs: u32,
        now: Timestamp,
    ) -> Result<Option<Runner>, StoreError> {
        let mut state = self.lock();
        let Some(runner) = state.runners.get_mut(&id.get()) else {
            return Ok(None);
        };
        runner.last_heartbeat = Some(now);
        runner.system_info = system_info;
        runner.current_jobs = current_jobs;
        if runner.status == RunnerStatus::Offline {
            runner.status = RunnerStatus::Online;
        }
        Ok(Some(runner.clone()))
    }

    fn set_runner_status(&self, id: RunnerId, status: RunnerStatus) -> Result<(), StoreError> {
        let mut state = self.lock();
        let runner = state
            .runners
            .get_mut(&id.get())
            .ok_or_else(|| StoreError::NotFound(format!("runner {id}")))?;
        runner.status = status;
        Ok(())
    }

    fn candidate_runners(&self, tenant_id: TenantId) -> Result<Vec<Runner>, StoreError> {
        Ok(self
            .lock()
            .runners
            .values()
            .filter(|runner| runner.serves_tenant(tenant_id))
            .cloned()
            .collect())
    }

    fn stale_runners(
        &self,
        now: Timestamp,
        threshold_seconds: i64,
    ) -> Result<Vec<Runner>, StoreError> {
        Ok(self
            .lock()
            .runners
            .values()
            .filter(|runner| {
                runner.status == RunnerStatus::Online && runner.is_stale(now, threshold_seconds)
            })
            .cloned()
            .collect())
    }

    fn create_secret(&self, new: NewSecret, now: Timestamp) -> Result<Secret, StoreError> {
        let mut state = self.lock();
        if state.secrets.values().any(|secret| {
            secret.tenant_id == new.tenant_id
                && secret.pipeline_id == new.pipeline_id
                && secret.name == new.name
        }) {
            return Err(StoreError::Conflict(format!(
                "secret name already exists: {}",
                new.name
            )));
        }
        let id = SecretId::new(id_from(state.allocate())?);
        let secret = Secret {
            id,
            tenant_id: new.tenant_id,
            pipeline_id: new.pipeline_id,
            name: new.name,
            ciphertext: new.ciphertext,
            scope: new.scope,
            last_updated_by: new.updated_by,
            created_at: now,
        };
        state.secrets.insert(id.get(), secret.clone());
        Ok(secret)
    }

    fn secrets_for_pipeline(
        &self,
        tenant_id: TenantId,
        pipeline_id: PipelineId,
    ) -> Result<Vec<Secret>, StoreError> {
        Ok(self
            .lock()
            .secrets
            .values()
            .filter(|secret| secret.tenant_id == tenant_id)
            .filter(|secret| {
                secret.pipeline_id.is_none() || secret.pipeline_id == Some(pipeline_id)
            })
            .cloned()
            .collect())
    }

    fn secret(&self, tenant_id: TenantId, id: SecretId) -> Result<Option<Secret>, StoreError> {
        Ok(self
            .lock()
            .secrets
            .get(&id.get())
            .filter(|secret| secret.tenant_id == tenant_id)
            .cloned())
    }

    fn create_artifact(&self, new: NewArtifact, now: Timestamp) -> Result<Artifact, StoreError> {
        let mut state = self.lock();
        if !state.jobs.contains_key(&new.job_id.get()) {
            return Err(StoreError::NotFound(format!("job {}", new.job_id)));
        }
        let id = ArtifactId::new(id_from(state.allocate())?);
        let artifact = Artifact {
            id,
            tenant_id: new.tenant_id,
            execution_id: new.execution_id,
            job_id: new.job_id,
            name: new.name,
            storage_path: new.storage_path,
            size_bytes: new.size_bytes,
            checksum_sha256: new.checksum_sha256,
            file_count: new.file_count,
            compression: new.compression,
            retention_days: new.retention_days,
            expires_at: now.plus_days(i64::from(new.retention_days)),
            created_at: now,
        };
        state.artifacts.insert(id.get(), artifact.clone());
        Ok(artifact)
    }

    fn artifact(
        &self,
        tenant_id: TenantId,
        id: ArtifactId,
    ) -> Result<Option<Artifact>, StoreError> {
        Ok(self
            .lock()
            .artifacts
            .get(&id.get())
            .filter(|artifact| artifact.tenant_id == tenant_id)
            .cloned())
    }

    fn create_api_key(
        &self,
        new: NewApiKey,
        now: Timestamp,
    ) -> Result<ApiKeyRecord, StoreError> {
        let mut state = self.lock();
        if state
            .api_keys
            .values()
            .any(|key| key.key_hash == new.key_hash)
        {
            return Err(StoreError::Conflict("api key hash already exists".to_string()));
        }
        let id = ApiKeyId::new(id_from(state.allocate())?);
        let record = ApiKeyRecord {
            id,
            tenant_id: new.tenant_id,
            user_id: new.user_id,
            name: new.name,
            key_hash: new.key_hash,
            key_prefix: new.key_prefix,
            scopes: new.scopes,
            active: true,
            expires_at: new.expires_at,
            last_used_at: None,
            created_at: now,
        };
        state.api_keys.insert(id.get(), record.clone());
        Ok(record)
    }

    fn api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        Ok(self
            .lock()
            .api_keys
            .values()
            .find(|key| key.key_hash == key_hash)
            .cloned())
    }

    fn record_api_key_use(&self, id: ApiKeyId, now: Timestamp) -> Result<(), StoreError> {
        let mut state = self.lock();
        if let Some(key) = state.api_keys.get_mut(&id.get()) {
            key.last_used_at = Some(now);
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Locked Helpers
// ============================================================================

/// Cancels one execution and its non-terminal jobs while holding the lock.
fn cancel_execution_locked(state: &mut State, raw: u64, now: Timestamp) -> Vec<CancelledJob> {
    let Some(execution) = state.executions.get_mut(&raw) else {
        return Vec::new();
    };
    if execution.status.is_terminal() {
        return Vec::new();
    }
    let execution_id = execution.id;
    execution.status = RunStatus::Cancelled;
    execution.finished_at = Some(now);

    let mut cancelled = Vec::new();
    let job_ids: Vec<u64> = state
        .jobs
        .values()
        .filter(|job| job.execution_id == execution_id && !job.status.is_terminal())
        .map(|job| job.id.get())
        .collect();
    for job_raw in job_ids {
        let Some(job) = state.jobs.get_mut(&job_raw) else {
            continue;
        };
        job.status = RunStatus::Cancelled;
        job.finished_at = Some(now);
        let runner_id = job.runner_id;
        cancelled.push(CancelledJob {
            job_id: job.id,
            execution_id,
            runner_id,
        });
        if let Some(runner_id) = runner_id
            && let Some(runner) = state.runners.get_mut(&runner_id.get())
        {
            runner.current_jobs = runner.current_jobs.saturating_sub(1);
        }
    }
    cancelled
}
