// crates/gantry-core/src/core/workflow.rs
// ============================================================================
// Module: Workflow Specification
// Description: Normalized workflow configuration tree.
// Purpose: Canonical, order-preserving form of a parsed pipeline YAML.
// Dependencies: crate::core::identifiers, serde, serde_json
// ============================================================================

//! ## Overview
//! The workflow spec is the normalized output of the YAML loader and the
//! single input of the trigger matcher, matrix expander, and execution
//! planner. Shapes that accept multiple YAML spellings (string vs list,
//! kebab-case vs snake_case keys) are normalized here to one canonical form.
//! Declaration order of jobs, steps, and matrix axes is preserved because it
//! is semantically meaningful downstream.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::JobKey;

// ============================================================================
// SECTION: Workflow Root
// ============================================================================

/// Normalized workflow configuration.
///
/// # Invariants
/// - `jobs` preserves YAML declaration order.
/// - Every `needs` entry of a valid spec references a declared job key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    /// Workflow display name.
    pub name: String,
    /// Trigger configuration (`on`).
    pub triggers: TriggerSpec,
    /// Workflow-level environment variables.
    pub env: BTreeMap<String, String>,
    /// Default run settings applied to steps.
    pub defaults: RunDefaults,
    /// Concurrency control, when configured.
    pub concurrency: Option<ConcurrencySpec>,
    /// Jobs in declaration order.
    pub jobs: Vec<JobSpec>,
}

impl WorkflowSpec {
    /// Returns the job with the given key, when declared.
    #[must_use]
    pub fn job(&self, key: &JobKey) -> Option<&JobSpec> {
        self.jobs.iter().find(|job| &job.key == key)
    }
}

/// Default run settings (`defaults.run`).
///
/// # Invariants
/// - `None` fields fall back to step-level or built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunDefaults {
    /// Default shell for `run` steps.
    pub shell: Option<String>,
    /// Default working directory for `run` steps.
    pub working_directory: Option<String>,
}

// ============================================================================
// SECTION: Triggers
// ============================================================================

/// Normalized trigger configuration.
///
/// # Invariants
/// - `None` means the trigger kind is not configured at all; a present but
///   empty filter means "any event of this kind".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TriggerSpec {
    /// Push trigger filter.
    pub push: Option<PushFilter>,
    /// Pull-request trigger filter.
    pub pull_request: Option<PullRequestFilter>,
    /// Schedule entries.
    pub schedule: Vec<ScheduleEntry>,
    /// Manual dispatch configuration.
    pub workflow_dispatch: Option<DispatchSpec>,
}

impl TriggerSpec {
    /// Returns the configured trigger kind labels in a stable order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        if self.push.is_some() {
            kinds.push("push");
        }
        if self.pull_request.is_some() {
            kinds.push("pull_request");
        }
        if !self.schedule.is_empty() {
            kinds.push("schedule");
        }
        if self.workflow_dispatch.is_some() {
            kinds.push("workflow_dispatch");
        }
        kinds
    }
}

/// Push trigger filter lists.
///
/// # Invariants
/// - Empty lists mean "unconstrained" for positive filters and "excludes
///   nothing" for ignore filters; `tags` is opt-in for tag pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PushFilter {
    /// Branch patterns that admit the push.
    pub branches: Vec<String>,
    /// Branch patterns that suppress the push.
    pub branches_ignore: Vec<String>,
    /// Changed-file patterns that admit the push.
    pub paths: Vec<String>,
    /// Changed-file patterns that suppress the push.
    pub paths_ignore: Vec<String>,
    /// Tag patterns that admit a tag push.
    pub tags: Vec<String>,
    /// Tag patterns that suppress a tag push.
    pub tags_ignore: Vec<String>,
}

impl PushFilter {
    /// Returns true when no filter list is populated.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.branches.is_empty()
            && self.branches_ignore.is_empty()
            && self.paths.is_empty()
            && self.paths_ignore.is_empty()
            && self.tags.is_empty()
            && self.tags_ignore.is_empty()
    }
}

/// Pull-request trigger filter lists.
///
/// # Invariants
/// - `types` is never empty after normalization (defaults applied).
/// - Path filters are accepted but not enforced at match time; PR payloads
///   carry no file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestFilter {
    /// Base-branch patterns that admit the event.
    pub branches: Vec<String>,
    /// Base-branch patterns that suppress the event.
    pub branches_ignore: Vec<String>,
    /// Changed-file patterns (accepted, not enforced).
    pub paths: Vec<String>,
    /// Changed-file ignore patterns (accepted, not enforced).
    pub paths_ignore: Vec<String>,
    /// Pull-request actions that admit the event.
    pub types: Vec<String>,
}

impl PullRequestFilter {
    /// Default pull-request actions when `types` is not configured.
    pub const DEFAULT_TYPES: [&'static str; 3] = ["opened", "synchronize", "reopened"];
}

impl Default for PullRequestFilter {
    fn default() -> Self {
        Self {
            branches: Vec::new(),
            branches_ignore: Vec::new(),
            paths: Vec::new(),
            paths_ignore: Vec::new(),
            types: Self::DEFAULT_TYPES.iter().map(ToString::to_string).collect(),
        }
    }
}

/// One schedule entry.
///
/// # Invariants
/// - `cron` has 5 or 6 whitespace-separated fields after validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Cron expression.
    pub cron: String,
}

/// Manual dispatch configuration.
///
/// # Invariants
/// - Input names are unique and preserve declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DispatchSpec {
    /// Declared inputs in declaration order.
    pub inputs: Vec<DispatchInput>,
}

/// Type of a manual dispatch input.
///
/// # Invariants
/// - Variants are stable for serialization and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchInputType {
    /// Free-form string input.
    #[default]
    String,
    /// Boolean input.
    Boolean,
    /// Choice from `options`.
    Choice,
    /// Deployment environment selector.
    Environment,
}

/// One declared manual dispatch input.
///
/// # Invariants
/// - `options` is only meaningful for `choice` inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchInput {
    /// Input name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the input must be provided.
    pub required: bool,
    /// Default value, when any.
    pub default: Option<Value>,
    /// Input type.
    pub input_type: DispatchInputType,
    /// Allowed values for `choice` inputs.
    pub options: Vec<String>,
}

/// Concurrency control configuration.
///
/// # Invariants
/// - An empty `group` disables concurrency control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConcurrencySpec {
    /// Mutual-exclusion key across executions of the same pipeline.
    pub group: String,
    /// Cancel older in-flight executions instead of queueing.
    pub cancel_in_progress: bool,
}

// ============================================================================
// SECTION: Jobs
// ============================================================================

/// Normalized job configuration.
///
/// # Invariants
/// - `runs_on` and `steps` are non-empty in a valid spec.
/// - `steps` preserves declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Job key as declared in YAML.
    pub key: JobKey,
    /// Display name (defaults to the key).
    pub name: String,
    /// Required runner labels.
    pub runs_on: Vec<String>,
    /// Job keys this job depends on.
    pub needs: Vec<JobKey>,
    /// `if` condition expression (empty when absent).
    pub condition: String,
    /// Container configuration, when any.
    pub container: Option<ContainerSpec>,
    /// Service containers in declaration order.
    pub services: Vec<ServiceSpec>,
    /// Job-level environment variables.
    pub env: BTreeMap<String, String>,
    /// Steps in declaration order.
    pub steps: Vec<StepSpec>,
    /// Matrix strategy, when any.
    pub strategy: Option<StrategySpec>,
    /// Timeout budget in minutes.
    pub timeout_minutes: u32,
    /// Declared job outputs (expressions keyed by output name).
    pub outputs: BTreeMap<String, String>,
}

/// Default timeout budget for jobs and steps, in minutes.
pub const DEFAULT_TIMEOUT_MINUTES: u32 = 60;

/// Default shell for `run` steps.
pub const DEFAULT_SHELL: &str = "bash";

/// Container configuration for a job or service.
///
/// # Invariants
/// - A bare string container normalizes to `{image}` with all else empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContainerSpec {
    /// Container image reference.
    pub image: String,
    /// Registry credentials, when any.
    pub credentials: Option<ContainerCredentials>,
    /// Container environment variables.
    pub env: BTreeMap<String, String>,
    /// Exposed ports (string or numeric YAML forms, normalized to strings).
    pub ports: Vec<String>,
    /// Volume mounts.
    pub volumes: Vec<String>,
    /// Extra container options.
    pub options: String,
}

/// Registry credentials for a container image.
///
/// # Invariants
/// - Values are references into the secret store at execution time; the
///   workflow definition may carry placeholder expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerCredentials {
    /// Registry username.
    pub username: String,
    /// Registry password or token expression.
    pub password: String,
}

/// One named service container.
///
/// # Invariants
/// - `name` is unique within the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Service name.
    pub name: String,
    /// Container configuration.
    pub container: ContainerSpec,
}

// ============================================================================
// SECTION: Strategy and Matrix
// ============================================================================

/// Job strategy configuration.
///
/// # Invariants
/// - `max_parallel` is advisory to the scheduler, not to the expander.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySpec {
    /// Cancel remaining matrix siblings on first failure.
    pub fail_fast: bool,
    /// Advisory cap on concurrently running matrix instances.
    pub max_parallel: Option<u32>,
    /// Matrix definition, when any.
    pub matrix: Option<MatrixSpec>,
}

impl Default for StrategySpec {
    fn default() -> Self {
        Self {
            fail_fast: true,
            max_parallel: None,
            matrix: None,
        }
    }
}

/// Ordered key/value row used for matrix include and exclude entries and for
/// expanded combinations.
///
/// Pairs preserve declaration order, which drives display-name composition.
pub type MatrixRow = Vec<(String, Value)>;

/// One matrix variable axis.
///
/// # Invariants
/// - `values` preserves YAML declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixAxis {
    /// Variable name.
    pub key: String,
    /// Values in declaration order.
    pub values: Vec<Value>,
}

/// Matrix definition.
///
/// # Invariants
/// - `axes` preserves YAML declaration order (stable key order for the
///   cartesian product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MatrixSpec {
    /// Variable axes in declaration order.
    pub axes: Vec<MatrixAxis>,
    /// Combinations appended verbatim after the base product.
    pub include: Vec<MatrixRow>,
    /// Patterns that remove matching base combinations.
    pub exclude: Vec<MatrixRow>,
}

impl MatrixSpec {
    /// Returns true when the matrix declares nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty() && self.include.is_empty() && self.exclude.is_empty()
    }
}

// ============================================================================
// SECTION: Steps
// ============================================================================

/// What a step executes: exactly one of a shell command or an action.
///
/// # Invariants
/// - The exactly-one rule is enforced by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Run a shell command.
    Run {
        /// Shell command text.
        command: String,
    },
    /// Invoke a reusable action.
    Uses {
        /// Action reference (`owner/repo@version`).
        action: String,
        /// Inputs passed to the action (`with`).
        with: BTreeMap<String, Value>,
    },
}

/// Normalized step configuration.
///
/// # Invariants
/// - `order` is the 0-based declaration index, unique within the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Display name (defaults to `Step {index+1}`).
    pub name: String,
    /// Optional step id for output references (empty when absent).
    pub id: String,
    /// What the step executes.
    pub action: StepAction,
    /// Step-level environment variables.
    pub env: BTreeMap<String, String>,
    /// Working directory for `run` steps (empty when absent).
    pub working_directory: String,
    /// Shell for `run` steps.
    pub shell: String,
    /// `if` condition expression (empty when absent).
    pub condition: String,
    /// Continue the job when this step fails.
    pub continue_on_error: bool,
    /// Timeout budget in minutes.
    pub timeout_minutes: u32,
}
