// crates/gantry-core/src/core/status.rs
// ============================================================================
// Module: Gantry Status Lifecycles
// Description: Status enums for executions, jobs, steps, and runners.
// Purpose: Encode the shared lifecycle with absorbing terminal states.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Executions, jobs, and steps share a single lifecycle:
//! `pending -> queued -> running -> {success|failed|cancelled|timeout|skipped}`.
//! Terminal states are absorbing; `finished_at` is written exactly when a
//! terminal state is entered. A step may enter `skipped` directly from
//! `pending` when its condition evaluates to false.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Run Status
// ============================================================================

/// Lifecycle status shared by executions, jobs, and steps.
///
/// # Invariants
/// - Variants are stable for serialization and wire framing.
/// - Terminal variants are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created and not yet admitted to the queue.
    Pending,
    /// Admitted and waiting for a runner.
    Queued,
    /// Executing on a runner.
    Running,
    /// Finished successfully.
    Success,
    /// Finished with a failure.
    Failed,
    /// Cancelled before completion.
    Cancelled,
    /// Exceeded its timeout budget.
    Timeout,
    /// Skipped without running.
    Skipped,
}

impl RunStatus {
    /// Returns true when the status is terminal (absorbing).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Cancelled | Self::Timeout | Self::Skipped
        )
    }

    /// Returns true when the status counts as an upstream dependency failure.
    #[must_use]
    pub const fn is_dependency_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled | Self::Timeout)
    }

    /// Returns true when a transition from `self` to `next` is legal.
    ///
    /// Terminal states absorb every transition. `skipped` may be entered
    /// directly from `pending`; all other forward moves follow the lifecycle
    /// order, and any non-terminal state may be cancelled or timed out.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Pending => false,
            Self::Queued => matches!(self, Self::Pending),
            Self::Running => matches!(self, Self::Pending | Self::Queued),
            Self::Success | Self::Failed => matches!(self, Self::Running),
            Self::Cancelled | Self::Timeout => true,
            Self::Skipped => matches!(self, Self::Pending),
        }
    }

    /// Returns a stable label for logs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::Skipped => "skipped",
        }
    }

    /// Parses a stable label back into a status.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "pending" => Some(Self::Pending),
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            "timeout" => Some(Self::Timeout),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Trigger Type
// ============================================================================

/// What caused an execution to be created.
///
/// # Invariants
/// - Variants are stable for serialization and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Push webhook event.
    Push,
    /// Pull-request webhook event.
    PullRequest,
    /// Scheduled (cron) fire.
    Schedule,
    /// Manual trigger by a user.
    Manual,
    /// Generic inbound webhook.
    Webhook,
    /// Programmatic API trigger.
    Api,
}

impl TriggerType {
    /// Returns a stable label for logs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::PullRequest => "pull_request",
            Self::Schedule => "schedule",
            Self::Manual => "manual",
            Self::Webhook => "webhook",
            Self::Api => "api",
        }
    }

    /// Parses a stable label back into a trigger type.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "push" => Some(Self::Push),
            "pull_request" => Some(Self::PullRequest),
            "schedule" => Some(Self::Schedule),
            "manual" => Some(Self::Manual),
            "webhook" => Some(Self::Webhook),
            "api" => Some(Self::Api),
            _ => None,
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Runner Status and Type
// ============================================================================

/// Runner availability status.
///
/// # Invariants
/// - Variants are stable for serialization and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerStatus {
    /// Connected and accepting work.
    Online,
    /// Not connected or past the heartbeat threshold.
    Offline,
    /// Connected but at capacity.
    Busy,
    /// Administratively withdrawn from scheduling.
    Maintenance,
}

impl RunnerStatus {
    /// Returns a stable label for logs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Busy => "busy",
            Self::Maintenance => "maintenance",
        }
    }

    /// Parses a stable label back into a runner status.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            "busy" => Some(Self::Busy),
            "maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runner deployment type.
///
/// # Invariants
/// - Variants are stable for serialization and storage.
/// - Shared runners carry no tenant binding and serve any tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerType {
    /// Operator-provided runner serving all tenants.
    Shared,
    /// Operator-provided runner bound to one tenant.
    Dedicated,
    /// Tenant-managed runner.
    SelfHosted,
}

impl RunnerType {
    /// Returns a stable label for logs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Dedicated => "dedicated",
            Self::SelfHosted => "self_hosted",
        }
    }

    /// Parses a stable label back into a runner type.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "shared" => Some(Self::Shared),
            "dedicated" => Some(Self::Dedicated),
            "self_hosted" => Some(Self::SelfHosted),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Log Level and Step Type
// ============================================================================

/// Severity level attached to a log chunk.
///
/// # Invariants
/// - Variants are stable for serialization and wire framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Normal output.
    #[default]
    Info,
    /// Recoverable problem.
    Warning,
    /// Failure output.
    Error,
}

impl LogLevel {
    /// Returns a stable label for logs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Parses a stable label back into a log level.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// How a step executes: a shell command or a reusable action.
///
/// # Invariants
/// - Variants are stable for serialization and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Run a shell command.
    Run,
    /// Invoke a reusable action reference.
    Uses,
}

impl StepType {
    /// Returns a stable label for logs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Uses => "uses",
        }
    }
}
