// crates/gantry-server/src/telemetry.rs
// ============================================================================
// Module: Control-Plane Telemetry
// Description: Observability hooks for webhooks, dispatch, and sessions.
// Purpose: Provide metric events without hard backend dependencies.
// Dependencies: none
// ============================================================================

//! ## Overview
//! A thin metrics interface for webhook outcomes, dispatch attempts, and
//! session frames. It is intentionally dependency-light so deployments can
//! plug in Prometheus or OpenTelemetry without redesign. Labels must never
//! carry secret material or raw payloads.

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Webhook processing outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Delivery processed; zero or more executions triggered.
    Processed,
    /// Ping acknowledged.
    Pong,
    /// Signature verification failed.
    Rejected,
    /// Malformed payload.
    Malformed,
    /// Unsupported event type.
    Ignored,
}

impl WebhookOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Pong => "pong",
            Self::Rejected => "rejected",
            Self::Malformed => "malformed",
            Self::Ignored => "ignored",
        }
    }
}

/// Session frame classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Heartbeat frame.
    Heartbeat,
    /// Log frame.
    Log,
    /// Status-update frame.
    StatusUpdate,
    /// Job-complete frame.
    JobComplete,
    /// Artifact-ready frame.
    ArtifactReady,
    /// Rejected or malformed frame.
    Invalid,
}

impl FrameKind {
    /// Returns a stable label for the frame kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::Log => "log",
            Self::StatusUpdate => "status_update",
            Self::JobComplete => "job_complete",
            Self::ArtifactReady => "artifact_ready",
            Self::Invalid => "invalid",
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for control-plane events.
pub trait ControlPlaneMetrics: Send + Sync {
    /// Records one webhook delivery outcome.
    fn record_webhook(&self, event_type: &str, outcome: WebhookOutcome);
    /// Records one dispatch attempt.
    fn record_dispatch(&self, delivered: bool);
    /// Records one inbound session frame.
    fn record_frame(&self, kind: FrameKind);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl ControlPlaneMetrics for NoopMetrics {
    fn record_webhook(&self, _event_type: &str, _outcome: WebhookOutcome) {}

    fn record_dispatch(&self, _delivered: bool) {}

    fn record_frame(&self, _kind: FrameKind) {}
}
