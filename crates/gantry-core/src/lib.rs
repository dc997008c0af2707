// crates/gantry-core/src/lib.rs
// ============================================================================
// Module: Gantry Core
// Description: Domain model and pure logic of the Gantry CI/CD control plane.
// Purpose: Provide entities, matching, expansion, planning, and store contracts.
// Dependencies: regex, serde, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! `gantry-core` holds everything the control plane computes without I/O:
//! the domain records (tenants, pipelines, executions, jobs, steps, runners,
//! secrets, artifacts), the normalized workflow specification, glob pattern
//! matching, matrix expansion, trigger matching, the job dependency graph,
//! the pure half of execution planning, and the storage contract with its
//! in-memory reference implementation.
//!
//! The core never reads the wall clock and never performs I/O; hosts supply
//! timestamps and storage. That keeps every decision in this crate
//! deterministic and replayable.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Domain records.
pub mod core;
/// Job dependency graph rules.
pub mod graph;
/// Storage contracts.
pub mod interfaces;
/// Matrix expansion.
pub mod matrix;
/// Glob pattern matching.
pub mod pattern;
/// Pure execution planning.
pub mod planner;
/// Shared status transition rules.
pub mod status_transitions;
/// In-memory reference store.
pub mod store_memory;
/// Trigger matching.
pub mod trigger;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use crate::core::artifact::Artifact;
pub use crate::core::artifact::DEFAULT_RETENTION_DAYS;
pub use crate::core::event::CommitInfo;
pub use crate::core::event::PingEvent;
pub use crate::core::event::PullRequestEvent;
pub use crate::core::event::PushEvent;
pub use crate::core::event::RepositoryInfo;
pub use crate::core::event::SenderInfo;
pub use crate::core::event::WebhookEvent;
pub use crate::core::execution::Execution;
pub use crate::core::execution::Job;
pub use crate::core::execution::LogChunk;
pub use crate::core::execution::Step;
pub use crate::core::identifiers::ApiKeyId;
pub use crate::core::identifiers::ArtifactId;
pub use crate::core::identifiers::ConcurrencyGroup;
pub use crate::core::identifiers::ConfigId;
pub use crate::core::identifiers::DeliveryId;
pub use crate::core::identifiers::ExecutionId;
pub use crate::core::identifiers::JobId;
pub use crate::core::identifiers::JobKey;
pub use crate::core::identifiers::PipelineId;
pub use crate::core::identifiers::RunnerId;
pub use crate::core::identifiers::SecretId;
pub use crate::core::identifiers::StepId;
pub use crate::core::identifiers::TenantId;
pub use crate::core::identifiers::UserId;
pub use crate::core::pipeline::Pipeline;
pub use crate::core::pipeline::PipelineConfigRecord;
pub use crate::core::runner::Runner;
pub use crate::core::secret::Secret;
pub use crate::core::secret::SecretScope;
pub use crate::core::status::LogLevel;
pub use crate::core::status::RunStatus;
pub use crate::core::status::RunnerStatus;
pub use crate::core::status::RunnerType;
pub use crate::core::status::StepType;
pub use crate::core::status::TriggerType;
pub use crate::core::tenant::Tenant;
pub use crate::core::tenant::TenantPlan;
pub use crate::core::tenant::TenantQuotas;
pub use crate::core::time::Timestamp;
pub use crate::core::user::ApiKeyRecord;
pub use crate::core::user::User;
pub use crate::core::user::UserRole;
pub use crate::core::workflow::ConcurrencySpec;
pub use crate::core::workflow::ContainerSpec;
pub use crate::core::workflow::DispatchInput;
pub use crate::core::workflow::DispatchInputType;
pub use crate::core::workflow::DispatchSpec;
pub use crate::core::workflow::JobSpec;
pub use crate::core::workflow::MatrixAxis;
pub use crate::core::workflow::MatrixRow;
pub use crate::core::workflow::MatrixSpec;
pub use crate::core::workflow::PullRequestFilter;
pub use crate::core::workflow::PushFilter;
pub use crate::core::workflow::RunDefaults;
pub use crate::core::workflow::ScheduleEntry;
pub use crate::core::workflow::ServiceSpec;
pub use crate::core::workflow::StepAction;
pub use crate::core::workflow::StepSpec;
pub use crate::core::workflow::StrategySpec;
pub use crate::core::workflow::TriggerSpec;
pub use crate::core::workflow::WorkflowSpec;
pub use crate::interfaces::CancelledJob;
pub use crate::interfaces::ControlPlaneStore;
pub use crate::interfaces::LogRecord;
pub use crate::interfaces::NewApiKey;
pub use crate::interfaces::NewArtifact;
pub use crate::interfaces::NewConfig;
pub use crate::interfaces::NewPipeline;
pub use crate::interfaces::NewRunner;
pub use crate::interfaces::NewSecret;
pub use crate::interfaces::NewTenant;
pub use crate::interfaces::PlannedExecution;
pub use crate::interfaces::StoreError;
pub use crate::planner::ExecutionPlan;
pub use crate::planner::GroupAdmission;
pub use crate::planner::PlannedJob;
pub use crate::store_memory::InMemoryStore;

/// Shared pointer type for the store used across the control plane.
pub type SharedStore = std::sync::Arc<dyn ControlPlaneStore>;
