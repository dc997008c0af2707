// crates/gantry-server/src/protocol.rs
// ============================================================================
// Module: Runner Session Protocol Frames
// Description: JSON frame types exchanged with runner sessions.
// Purpose: One typed surface for the bidirectional runner channel.
// Dependencies: gantry-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Frames are JSON objects with a mandatory `type` tag. The server sends
//! `connected`, `job_assignment`, `job_cancel`, `heartbeat_ack`, and
//! `error`; runners send `heartbeat`, `log`, `status_update`,
//! `job_complete`, and `artifact_ready`. Unknown inbound types elicit an
//! error frame and are otherwise ignored; malformed JSON elicits an error
//! frame without closing the session.

// ============================================================================
// SECTION: Imports
// ============================================================================

use gantry_core::ContainerSpec;
use gantry_core::JobId;
use gantry_core::LogLevel;
use gantry_core::RunStatus;
use gantry_core::RunnerId;
use gantry_core::ServiceSpec;
use gantry_core::Step;
use gantry_core::StepId;
use gantry_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Server to Runner
// ============================================================================

/// Job payload delivered with an assignment.
///
/// # Invariants
/// - `secrets` carries materialized plaintext and exists only inside this
///   short-lived frame; it is never persisted or logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAssignmentPayload {
    /// Job identifier.
    pub id: JobId,
    /// Job display name.
    pub name: String,
    /// Steps in execution order.
    pub steps: Vec<Step>,
    /// Job environment variables.
    pub env: Map<String, Value>,
    /// Container configuration, when any.
    pub container: Option<ContainerSpec>,
    /// Service containers.
    pub services: Vec<ServiceSpec>,
    /// Materialized secret values by name.
    pub secrets: Map<String, Value>,
    /// Timeout budget in minutes.
    pub timeout_minutes: u32,
}

/// Frames sent from the server to a runner.
///
/// # Invariants
/// - Serialized form carries the mandatory `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Handshake confirmation.
    Connected {
        /// Runner identifier.
        runner_id: RunnerId,
    },
    /// Job dispatch.
    JobAssignment {
        /// Assigned job payload.
        job: JobAssignmentPayload,
    },
    /// Cancellation of an assigned job.
    JobCancel {
        /// Job to cancel.
        job_id: JobId,
    },
    /// Heartbeat acknowledgement.
    HeartbeatAck {
        /// Server timestamp (unix milliseconds).
        timestamp: i64,
    },
    /// Error reply to a rejected or malformed frame.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

// ============================================================================
// SECTION: Runner to Server
// ============================================================================

/// Entity kinds a runner may update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateEntity {
    /// Job entity.
    Job,
    /// Step entity.
    Step,
}

/// Frames received from a runner.
///
/// # Invariants
/// - Deserialization requires the `type` tag; payload fields default
///   defensively where the protocol allows omission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunnerFrame {
    /// Liveness report.
    Heartbeat {
        /// System information (OS, CPU, memory).
        #[serde(default)]
        system_info: Map<String, Value>,
        /// Jobs currently executing on the runner.
        #[serde(default)]
        current_jobs: u32,
    },
    /// One log chunk.
    Log {
        /// Job the chunk belongs to.
        job_id: JobId,
        /// Step the chunk belongs to.
        step_id: StepId,
        /// Chunk text.
        content: String,
        /// Severity level.
        #[serde(default)]
        level: LogLevel,
        /// Runner-side timestamp (unix milliseconds).
        #[serde(default)]
        timestamp: Option<i64>,
    },
    /// Job or step status change.
    StatusUpdate {
        /// Entity kind.
        entity_type: UpdateEntity,
        /// Entity identifier.
        entity_id: u64,
        /// New status.
        status: RunStatus,
        /// Process exit code (steps).
        #[serde(default)]
        exit_code: Option<i32>,
        /// Reported outputs.
        #[serde(default)]
        outputs: Option<Map<String, Value>>,
    },
    /// Terminal job completion.
    JobComplete {
        /// Finished job.
        job_id: JobId,
        /// Terminal status.
        status: RunStatus,
        /// Job outputs.
        #[serde(default)]
        outputs: Map<String, Value>,
    },
    /// Artifact upload notification.
    ArtifactReady {
        /// Producing job.
        job_id: JobId,
        /// Artifact name.
        name: String,
        /// Storage backend path.
        path: String,
        /// Total size in bytes.
        size_bytes: u64,
        /// Hex SHA-256 checksum.
        checksum: String,
        /// Number of files inside the artifact.
        #[serde(default)]
        file_count: Option<u32>,
    },
}

/// Parses an inbound text frame, distinguishing malformed JSON from unknown
/// frame types for error reporting.
///
/// # Errors
///
/// Returns a human-readable reason suitable for an [`ServerFrame::Error`]
/// reply.
pub fn parse_runner_frame(text: &str) -> Result<RunnerFrame, String> {
    let value: Value =
        serde_json::from_str(text).map_err(|_| "invalid JSON".to_string())?;
    let frame_type = value
        .get("type")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    serde_json::from_value(value).map_err(|_| match frame_type {
        Some(frame_type) => format!("unknown or malformed message type: {frame_type}"),
        None => "missing message type".to_string(),
    })
}

/// Converts an optional runner-reported timestamp, falling back to `now`.
#[must_use]
pub fn frame_timestamp(reported: Option<i64>, now: Timestamp) -> Timestamp {
    reported.map_or(now, Timestamp::from_unix_millis)
}
