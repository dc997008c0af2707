// crates/gantry-core/src/interfaces/mod.rs
// ============================================================================
// Module: Control-Plane Interfaces
// Description: Backend-agnostic storage contract for the control plane.
// Purpose: Define the persistence surface used by planner, scheduler, and sessions.
// Dependencies: crate::core, crate::planner, serde, thiserror
// ============================================================================

//! ## Overview
//! The storage interface isolates the control plane from its backend. Every
//! query that returns tenant-owned data takes the tenant scope explicitly or
//! returns records carrying their tenant, and implementations must never
//! leak rows across tenants. Implementations are synchronous and internally
//! locked; callers treat each method as one atomic step. Methods that the
//! correctness model calls out as atomic (`commit_plan`, `claim_job`,
//! `append_log_chunk`) must be implemented as single transactions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

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
use crate::core::identifiers::UserId;
use crate::core::pipeline::Pipeline;
use crate::core::pipeline::PipelineConfigRecord;
use crate::core::runner::Runner;
use crate::core::secret::Secret;
use crate::core::secret::SecretScope;
use crate::core::status::LogLevel;
use crate::core::status::RunStatus;
use crate::core::status::RunnerStatus;
use crate::core::status::RunnerType;
use crate::core::tenant::Tenant;
use crate::core::tenant::TenantPlan;
use crate::core::tenant::TenantQuotas;
use crate::core::time::Timestamp;
use crate::core::user::ApiKeyRecord;
use crate::core::workflow::WorkflowSpec;
use crate::planner::ExecutionPlan;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Control-plane store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling and HTTP mapping.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Store data is invalid.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Unique-constraint conflict (duplicate slug, name, or number race).
    #[error("store conflict: {0}")]
    Conflict(String),
    /// Referenced entity does not exist.
    #[error("store entity not found: {0}")]
    NotFound(String),
    /// Store reported an error.
    #[error("store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Creation Records
// ============================================================================

/// Input record for tenant creation.
///
/// # Invariants
/// - `slug` must be globally unique; violations surface as `Conflict`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTenant {
    /// Human-readable tenant name.
    pub name: String,
    /// URL-safe unique slug.
    pub slug: String,
    /// Commercial plan.
    pub plan: TenantPlan,
    /// Resource quotas.
    pub quotas: TenantQuotas,
}

/// Input record for pipeline creation.
///
/// # Invariants
/// - `(tenant_id, slug)` must be unique; violations surface as `Conflict`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPipeline {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Human-readable pipeline name.
    pub name: String,
    /// URL-safe slug, unique within the tenant.
    pub slug: String,
    /// Source repository URL.
    pub repo_url: String,
    /// Default branch name.
    pub default_branch: String,
    /// Workflow file path inside the repository.
    pub config_path: String,
    /// Webhook secret (empty when unset).
    pub webhook_secret: String,
}

/// Input record for a new configuration version.
///
/// # Invariants
/// - The store allocates `version` as `max(version) + 1` per pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConfig {
    /// Owning pipeline.
    pub pipeline_id: PipelineId,
    /// Raw YAML document.
    pub yaml_raw: String,
    /// Normalized spec, when the document parsed.
    pub parsed: Option<WorkflowSpec>,
    /// Commit SHA the configuration came from.
    pub commit_sha: String,
    /// Whether validation passed.
    pub is_valid: bool,
    /// Accumulated validation errors.
    pub validation_errors: Vec<String>,
}

/// Input record for runner registration.
///
/// # Invariants
/// - `tenant_id` is `None` exactly when `runner_type` is `Shared`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRunner {
    /// Owning tenant (`None` for shared runners).
    pub tenant_id: Option<TenantId>,
    /// Human-readable runner name.
    pub name: String,
    /// Hex SHA-256 hash of the registration token.
    pub token_hash: String,
    /// Deployment type.
    pub runner_type: RunnerType,
    /// Labels used for job matching.
    pub labels: Vec<String>,
    /// Capacity ceiling for concurrent jobs.
    pub max_concurrent_jobs: u32,
    /// Runner agent version string.
    pub version: String,
}

/// Input record for secret creation.
///
/// # Invariants
/// - `(tenant_id, pipeline_id, name)` must be unique; violations surface as
///   `Conflict`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSecret {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning pipeline for pipeline-scoped secrets.
    pub pipeline_id: Option<PipelineId>,
    /// Secret name.
    pub name: String,
    /// Encrypted value.
    pub ciphertext: String,
    /// Visibility scope.
    pub scope: SecretScope,
    /// User performing the write.
    pub updated_by: Option<UserId>,
}

/// Input record for artifact creation.
///
/// # Invariants
/// - The store computes `expires_at = now + retention_days`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArtifact {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning execution.
    pub execution_id: ExecutionId,
    /// Producing job.
    pub job_id: JobId,
    /// Artifact name.
    pub name: String,
    /// Storage backend path.
    pub storage_path: String,
    /// Total size in bytes.
    pub size_bytes: u64,
    /// Hex SHA-256 checksum.
    pub checksum_sha256: String,
    /// Number of files.
    pub file_count: u32,
    /// Compression label (empty when uncompressed).
    pub compression: String,
    /// Retention in days.
    pub retention_days: u32,
}

/// Input record for API key creation.
///
/// # Invariants
/// - `key_hash` must be unique; violations surface as `Conflict`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApiKey {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning user.
    pub user_id: Option<UserId>,
    /// Human-readable key name.
    pub name: String,
    /// Hex SHA-256 hash of the raw key.
    pub key_hash: String,
    /// First 8 characters of the raw key.
    pub key_prefix: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Expiry time, when any.
    pub expires_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Plan Commit Results
// ============================================================================

/// One job cancelled while admitting a plan or cancelling an execution.
///
/// # Invariants
/// - `runner_id` is present when the job was assigned at cancellation time,
///   so the caller can emit `job_cancel` to the right session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelledJob {
    /// Cancelled job.
    pub job_id: JobId,
    /// Execution the job belongs to.
    pub execution_id: ExecutionId,
    /// Runner the job was assigned to, when any.
    pub runner_id: Option<RunnerId>,
}

/// Result of committing an execution plan.
///
/// # Invariants
/// - `execution.number` is unique per pipeline even under contention.
/// - `cancelled` lists jobs of older group members cancelled by
///   `cancel_in_progress`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedExecution {
    /// The committed execution record.
    pub execution: Execution,
    /// The committed job records, with steps persisted alongside.
    pub jobs: Vec<Job>,
    /// Jobs of older executions cancelled during group admission.
    pub cancelled: Vec<CancelledJob>,
}

/// One log record returned by backlog reads, joined with its job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Job the chunk's step belongs to.
    pub job_id: JobId,
    /// Stored chunk.
    pub chunk: LogChunk,
}

// ============================================================================
// SECTION: Store Contract
// ============================================================================

/// Backend-agnostic control-plane store.
///
/// Implementations are internally synchronized; every method is one atomic
/// step from the caller's perspective.
pub trait ControlPlaneStore: Send + Sync {
    // ------------------------------------------------------------------
    // Tenants
    // ------------------------------------------------------------------

    /// Creates a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a duplicate slug.
    fn create_tenant(&self, new: NewTenant, now: Timestamp) -> Result<Tenant, StoreError>;

    /// Loads a tenant by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn tenant(&self, id: TenantId) -> Result<Option<Tenant>, StoreError>;

    /// Loads an active tenant by slug.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, StoreError>;

    // ------------------------------------------------------------------
    // Pipelines and configurations
    // ------------------------------------------------------------------

    /// Creates a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a duplicate `(tenant, slug)`.
    fn create_pipeline(&self, new: NewPipeline, now: Timestamp) -> Result<Pipeline, StoreError>;

    /// Loads a pipeline within a tenant scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn pipeline(
        &self,
        tenant_id: TenantId,
        id: PipelineId,
    ) -> Result<Option<Pipeline>, StoreError>;

    /// Finds active pipelines whose repository URL contains any needle.
    ///
    /// Webhook routing is tenant-blind by design: the delivery authenticates
    /// via per-pipeline secrets, not a tenant context.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn pipelines_for_repo(&self, needles: &[String]) -> Result<Vec<Pipeline>, StoreError>;

    /// Updates a pipeline's `last_execution_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn touch_pipeline(&self, id: PipelineId, at: Timestamp) -> Result<(), StoreError>;

    /// Appends a configuration version (version allocated by the store).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn insert_config(
        &self,
        new: NewConfig,
        now: Timestamp,
    ) -> Result<PipelineConfigRecord, StoreError>;

    /// Loads the highest-version valid configuration of a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn latest_valid_config(
        &self,
        pipeline_id: PipelineId,
    ) -> Result<Option<PipelineConfigRecord>, StoreError>;

    /// Loads one frozen configuration version by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn config(&self, id: ConfigId) -> Result<Option<PipelineConfigRecord>, StoreError>;

    // ------------------------------------------------------------------
    // Executions
    // ------------------------------------------------------------------

    /// Commits an execution plan atomically.
    ///
    /// Allocates `number = max(number)+1` under the pipeline write lock,
    /// persists the execution with its jobs and steps, applies concurrency
    /// group admission (cancelling older members when requested), enqueues
    /// the execution-ready work item, and touches the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the numbering race loses, and
    /// other [`StoreError`] variants when the transaction fails.
    fn commit_plan(
        &self,
        plan: &ExecutionPlan,
        now: Timestamp,
    ) -> Result<PlannedExecution, StoreError>;

    /// Loads an execution by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError>;

    /// Transitions an execution's status, maintaining its timing fields.
    ///
    /// Terminal transitions set `finished_at`; `running` sets `started_at`
    /// once; `queued` sets `queued_at` once. Terminal states absorb.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn update_execution_status(
        &self,
        id: ExecutionId,
        status: RunStatus,
        now: Timestamp,
    ) -> Result<(), StoreError>;

    /// Cancels an execution and its non-terminal jobs.
    ///
    /// Returns the cancelled jobs with their runner assignments so the
    /// caller can emit `job_cancel` frames. Runner `current_jobs` counters
    /// are decremented for assigned jobs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn cancel_execution(
        &self,
        id: ExecutionId,
        now: Timestamp,
    ) -> Result<Vec<CancelledJob>, StoreError>;

    /// Lists non-terminal executions of a pipeline's concurrency group.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn executions_in_group(
        &self,
        pipeline_id: PipelineId,
        group: &ConcurrencyGroup,
    ) -> Result<Vec<Execution>, StoreError>;

    /// Dequeues one pending execution-ready work item, when any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the dequeue fails.
    fn dequeue_ready(&self) -> Result<Option<ExecutionId>, StoreError>;

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    /// Loads a job by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn job(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    /// Lists the jobs of an execution in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn jobs_for_execution(&self, execution_id: ExecutionId) -> Result<Vec<Job>, StoreError>;

    /// Marks a pending job as queued.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn mark_job_queued(&self, id: JobId, now: Timestamp) -> Result<(), StoreError>;

    /// Claims a queued job for a runner with at-most-once semantics.
    ///
    /// Atomically sets `runner_id` and increments the runner's
    /// `current_jobs` if and only if the job is still `queued`. Returns
    /// false when another scheduler won the race.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn claim_job(
        &self,
        job_id: JobId,
        runner_id: RunnerId,
        now: Timestamp,
    ) -> Result<bool, StoreError>;

    /// Rolls back a claim whose session delivery failed.
    ///
    /// Returns the job to the queued pool and decrements the runner's
    /// counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn release_job(&self, job_id: JobId, runner_id: RunnerId) -> Result<(), StoreError>;

    /// Transitions a job's status, maintaining timing fields.
    ///
    /// Returns the updated job, or `None` when it does not exist. Terminal
    /// states absorb: a transition from a terminal status is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn update_job_status(
        &self,
        id: JobId,
        status: RunStatus,
        outputs: Option<Map<String, Value>>,
        now: Timestamp,
    ) -> Result<Option<Job>, StoreError>;

    /// Finishes a job: terminal transition plus runner counter decrement.
    ///
    /// Every dispatch pairs with exactly one decrement, performed here or by
    /// the disconnection sweep.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn finish_job(
        &self,
        id: JobId,
        status: RunStatus,
        outputs: Map<String, Value>,
        now: Timestamp,
    ) -> Result<Option<Job>, StoreError>;

    /// Requeues a disconnected runner's in-flight jobs as `pending`.
    ///
    /// Clears assignments, resets the runner's counter, and returns the
    /// requeued job identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn requeue_runner_jobs(
        &self,
        runner_id: RunnerId,
        now: Timestamp,
    ) -> Result<Vec<JobId>, StoreError>;

    /// Lists all currently running jobs (for the timeout sweep).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn running_jobs(&self) -> Result<Vec<Job>, StoreError>;

    /// Lists all currently queued jobs in queue order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn queued_jobs(&self) -> Result<Vec<Job>, StoreError>;

    // ------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------

    /// Loads a step by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn step(&self, id: StepId) -> Result<Option<Step>, StoreError>;

    /// Lists the steps of a job in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn steps_for_job(&self, job_id: JobId) -> Result<Vec<Step>, StoreError>;

    /// Transitions a step's status, maintaining timing fields.
    ///
    /// Returns the updated step, or `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn update_step_status(
        &self,
        id: StepId,
        status: RunStatus,
        exit_code: Option<i32>,
        outputs: Option<Map<String, Value>>,
        now: Timestamp,
    ) -> Result<Option<Step>, StoreError>;

    // ------------------------------------------------------------------
    // Logs
    // ------------------------------------------------------------------

    /// Appends a log chunk with `chunk_number = max + 1` for the step.
    ///
    /// Allocation and insert happen in one transaction; uniqueness of
    /// `(step, chunk_number)` is the storage-level floor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the step does not exist.
    fn append_log_chunk(
        &self,
        step_id: StepId,
        content: String,
        level: LogLevel,
        timestamp: Timestamp,
    ) -> Result<LogChunk, StoreError>;

    /// Reads the log backlog of an execution (optionally one job).
    ///
    /// Returns at most `limit` records ordered by
    /// `(job, step order, chunk_number)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn log_backlog(
        &self,
        execution_id: ExecutionId,
        job_id: Option<JobId>,
        limit: usize,
    ) -> Result<Vec<LogRecord>, StoreError>;

    // ------------------------------------------------------------------
    // Runners
    // ------------------------------------------------------------------

    /// Registers a runner.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a duplicate token hash.
    fn create_runner(&self, new: NewRunner, now: Timestamp) -> Result<Runner, StoreError>;

    /// Loads a runner by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn runner(&self, id: RunnerId) -> Result<Option<Runner>, StoreError>;

    /// Records a heartbeat: updates liveness fields and flips
    /// `offline -> online`.
    ///
    /// Returns the updated runner, or `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn update_runner_heartbeat(
        &self,
        id: RunnerId,
        system_info: Map<String, Value>,
        current_jobs: u32,
        now: Timestamp,
    ) -> Result<Option<Runner>, StoreError>;

    /// Sets a runner's availability status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn set_runner_status(&self, id: RunnerId, status: RunnerStatus) -> Result<(), StoreError>;

    /// Lists runners eligible to serve a tenant's jobs (tenant-bound plus
    /// shared).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn candidate_runners(&self, tenant_id: TenantId) -> Result<Vec<Runner>, StoreError>;

    /// Lists online runners silent past the offline threshold.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn stale_runners(
        &self,
        now: Timestamp,
        threshold_seconds: i64,
    ) -> Result<Vec<Runner>, StoreError>;

    // ------------------------------------------------------------------
    // Secrets
    // ------------------------------------------------------------------

    /// Creates a secret.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a duplicate
    /// `(tenant, pipeline, name)`.
    fn create_secret(&self, new: NewSecret, now: Timestamp) -> Result<Secret, StoreError>;

    /// Lists the secrets visible to a pipeline (organization-scoped plus its
    /// own pipeline-scoped entries).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn secrets_for_pipeline(
        &self,
        tenant_id: TenantId,
        pipeline_id: PipelineId,
    ) -> Result<Vec<Secret>, StoreError>;

    /// Loads a secret within a tenant scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn secret(&self, tenant_id: TenantId, id: SecretId) -> Result<Option<Secret>, StoreError>;

    // ------------------------------------------------------------------
    // Artifacts
    // ------------------------------------------------------------------

    /// Creates an artifact (`expires_at = now + retention_days`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the job does not exist.
    fn create_artifact(&self, new: NewArtifact, now: Timestamp) -> Result<Artifact, StoreError>;

    /// Loads an artifact within a tenant scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn artifact(
        &self,
        tenant_id: TenantId,
        id: ArtifactId,
    ) -> Result<Option<Artifact>, StoreError>;

    // ------------------------------------------------------------------
    // API keys
    // ------------------------------------------------------------------

    /// Creates an API key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a duplicate key hash.
    fn create_api_key(&self, new: NewApiKey, now: Timestamp)
    -> Result<ApiKeyRecord, StoreError>;

    /// Loads an API key by its hex SHA-256 hash.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError>;

    /// Records API key usage.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn record_api_key_use(&self, id: ApiKeyId, now: Timestamp) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Probes
    // ------------------------------------------------------------------

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
