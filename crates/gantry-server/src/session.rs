// crates/gantry-server/src/session.rs
// ============================================================================
// Module: Runner Session Handling
// Description: Authenticated persistent runner channel over WebSocket.
// Purpose: Route inbound frames, deliver assignments, and sweep disconnects.
// Dependencies: axum, futures-util, gantry-core, serde_json, tokio, tracing
// ============================================================================

//! ## Overview
//! A runner session opens at `/ws/runner/{runner_id}?token=...`. The token
//! is hashed and compared constant-time against the stored hash; a mismatch
//! closes immediately. On success the server emits `connected`, marks the
//! runner online, and serves the channel until it drops: inbound frames
//! mutate state and publish to the bus, outbound frames arrive from the
//! scheduler through the registry. One bad frame never tears down the
//! session; disconnection marks the runner offline and requeues its
//! in-flight jobs. Runners may only reference jobs assigned to them; any
//! other entity reference is rejected with an error frame.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use futures_util::SinkExt;
use futures_util::StreamExt;
use gantry_core::Job;
use gantry_core::Runner;
use gantry_core::RunnerId;
use gantry_core::RunnerStatus;
use gantry_core::RunStatus;
use serde_json::Map;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::AppState;
use crate::auth::token_matches;
use crate::bus::EntityKind;
use crate::protocol::RunnerFrame;
use crate::protocol::ServerFrame;
use crate::protocol::UpdateEntity;
use crate::protocol::frame_timestamp;
use crate::protocol::parse_runner_frame;
use crate::registry::SessionHandle;
use crate::telemetry::FrameKind;

// ============================================================================
// SECTION: Handshake
// ============================================================================

/// Authenticates a runner session token.
///
/// The token is hashed with SHA-256 and compared constant-time against the
/// stored hash. Unknown runners and mismatched tokens are indistinguishable
/// to the caller.
#[must_use]
pub fn authenticate_runner(
    state: &AppState,
    runner_id: Option<RunnerId>,
    token: &str,
) -> Option<Runner> {
    let runner_id = runner_id?;
    if token.is_empty() {
        return None;
    }
    let runner = state.store.runner(runner_id).ok().flatten()?;
    if token_matches(token, &runner.token_hash) {
        Some(runner)
    } else {
        warn!(runner = %runner.name, "runner token mismatch");
        None
    }
}

// ============================================================================
// SECTION: Session Loop
// ============================================================================

/// Serves one authenticated runner session until the socket drops.
pub async fn run_runner_session(state: Arc<AppState>, socket: WebSocket, runner: Runner) {
    let now = state.now();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerFrame>();
    state
        .registry
        .attach(runner.id, SessionHandle::new(runner.tenant_id, outbound_tx.clone()));

    // Connecting counts as a heartbeat: the runner is online from frame one.
    let _ = state
        .store
        .update_runner_heartbeat(runner.id, Map::new(), 0, now);
    let _ = outbound_tx.send(ServerFrame::Connected {
        runner_id: runner.id,
    });
    info!(runner = %runner.name, "runner session opened");

    // A fresh session is new capacity; re-scan the queued pool.
    if let Err(error) = state.scheduler.on_capacity_available(now) {
        warn!(%error, "capacity re-scan failed on session open");
    }

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                let Some(frame) = outbound else { break };
                let Ok(text) = serde_json::to_string(&frame) else { continue };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_frame(&state, &runner, text.as_str()) {
                            let _ = outbound_tx.send(reply);
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Disconnection is an immediate offline mark plus a requeue sweep.
    state.registry.detach(runner.id);
    let now = state.now();
    let _ = state
        .store
        .set_runner_status(runner.id, RunnerStatus::Offline);
    if let Err(error) = state.scheduler.handle_disconnect(runner.id, now) {
        warn!(%error, runner = %runner.name, "disconnect sweep failed");
    }
    info!(runner = %runner.name, "runner session closed");
}

// ============================================================================
// SECTION: Inbound Frames
// ============================================================================

/// Handles one inbound frame, returning the reply to send (when any).
///
/// Errors are isolated per frame: a rejected frame produces an error reply
/// and the session continues.
#[must_use]
pub fn handle_frame(state: &AppState, runner: &Runner, text: &str) -> Option<ServerFrame> {
    let now = state.now();
    let frame = match parse_runner_frame(text) {
        Ok(frame) => frame,
        Err(reason) => {
            state.metrics.record_frame(FrameKind::Invalid);
            return Some(ServerFrame::Error { message: reason });
        }
    };

    let outcome = match frame {
        RunnerFrame::Heartbeat {
            system_info,
            current_jobs,
        } => {
            state.metrics.record_frame(FrameKind::Heartbeat);
            let before = state.store.runner(runner.id).ok().flatten();
            let updated = state
                .store
                .update_runner_heartbeat(runner.id, system_info, current_jobs, now);
            // A heartbeat that flips a runner back online frees capacity.
            if let (Some(before), Ok(Some(after))) = (before, &updated)
                && before.status == RunnerStatus::Offline
                && after.status == RunnerStatus::Online
            {
                let _ = state.scheduler.on_capacity_available(now);
            }
            return Some(ServerFrame::HeartbeatAck {
                timestamp: now.as_unix_millis(),
            });
        }
        RunnerFrame::Log {
            job_id,
            step_id,
            content,
            level,
            timestamp,
        } => {
            state.metrics.record_frame(FrameKind::Log);
            let Some(job) = owned_job(state, runner, job_id) else {
                return Some(reject("job is not assigned to this runner"));
            };
            let Ok(Some(step)) = state.store.step(step_id) else {
                return Some(reject("unknown step"));
            };
            if step.job_id != job.id {
                return Some(reject("step does not belong to the referenced job"));
            }
            let reported = frame_timestamp(timestamp, now);
            match state
                .store
                .append_log_chunk(step_id, content.clone(), level, reported)
            {
                Ok(chunk) => {
                    state.bus.publish_log(
                        job.execution_id,
                        job.id,
                        step_id,
                        chunk.content,
                        level,
                        reported,
                    );
                    None
                }
                Err(error) => Some(reject(&error.to_string())),
            }
        }
        RunnerFrame::StatusUpdate {
            entity_type,
            entity_id,
            status,
            exit_code,
            outputs,
        } => {
            state.metrics.record_frame(FrameKind::StatusUpdate);
            handle_status_update(state, runner, entity_type, entity_id, status, exit_code, outputs)
        }
        RunnerFrame::JobComplete {
            job_id,
            status,
            outputs,
        } => {
            state.metrics.record_frame(FrameKind::JobComplete);
            let Some(_job) = owned_job(state, runner, job_id) else {
                return Some(reject("job is not assigned to this runner"));
            };
            if !status.is_terminal() {
                return Some(reject("job_complete requires a terminal status"));
            }
            match state.store.finish_job(job_id, status, outputs, now) {
                Ok(Some(finished)) => {
                    state.bus.publish_status(
                        finished.execution_id,
                        EntityKind::Job,
                        job_id.get(),
                        finished.status,
                        now,
                    );
                    if let Err(error) = state.scheduler.on_job_finished(&finished, now) {
                        warn!(%error, "post-completion scheduling failed");
                    }
                    None
                }
                Ok(None) => Some(reject("unknown job")),
                Err(error) => Some(reject(&error.to_string())),
            }
        }
        RunnerFrame::ArtifactReady {
            job_id,
            name,
            path,
            size_bytes,
            checksum,
            file_count,
        } => {
            state.metrics.record_frame(FrameKind::ArtifactReady);
            let Some(job) = owned_job(state, runner, job_id) else {
                return Some(reject("job is not assigned to this runner"));
            };
            let Ok(Some(execution)) = state.store.execution(job.execution_id) else {
                return Some(reject("unknown execution"));
            };
            let new_artifact = gantry_core::NewArtifact {
                tenant_id: execution.tenant_id,
                execution_id: execution.id,
                job_id: job.id,
                name,
                storage_path: path,
                size_bytes,
                checksum_sha256: checksum,
                file_count: file_count.unwrap_or(1),
                compression: "gzip".to_string(),
                retention_days: gantry_core::DEFAULT_RETENTION_DAYS,
            };
            match state.store.create_artifact(new_artifact, now) {
                Ok(artifact) => {
                    debug!(artifact = %artifact.name, job = %job.name, "artifact recorded");
                    None
                }
                Err(error) => Some(reject(&error.to_string())),
            }
        }
    };
    outcome
}

/// Handles a job or step status update with ownership checks.
fn handle_status_update(
    state: &AppState,
    runner: &Runner,
    entity_type: UpdateEntity,
    entity_id: u64,
    status: RunStatus,
    exit_code: Option<i32>,
    outputs: Option<Map<String, serde_json::Value>>,
) -> Option<ServerFrame> {
    let now = state.now();
    match entity_type {
        UpdateEntity::Job => {
            let Some(job_id) = gantry_core::JobId::from_raw(entity_id) else {
                return Some(reject("invalid entity id"));
            };
            let Some(job) = owned_job(state, runner, job_id) else {
                return Some(reject("job is not assigned to this runner"));
            };
            match state.store.update_job_status(job_id, status, outputs, now) {
                Ok(Some(updated)) => {
                    // The first running job moves the execution to running.
                    if status == RunStatus::Running {
                        let _ = state.store.update_execution_status(
                            job.execution_id,
                            RunStatus::Running,
                            now,
                        );
                    }
                    state.bus.publish_status(
                        updated.execution_id,
                        EntityKind::Job,
                        entity_id,
                        updated.status,
                        now,
                    );
                    None
                }
                Ok(None) => Some(reject("unknown job")),
                Err(error) => Some(reject(&error.to_string())),
            }
        }
        UpdateEntity::Step => {
            let Some(step_id) = gantry_core::StepId::from_raw(entity_id) else {
                return Some(reject("invalid entity id"));
            };
            let Ok(Some(step)) = state.store.step(step_id) else {
                return Some(reject("unknown step"));
            };
            let Some(job) = owned_job(state, runner, step.job_id) else {
                return Some(reject("step does not belong to this runner's jobs"));
            };
            match state
                .store
                .update_step_status(step_id, status, exit_code, outputs, now)
            {
                Ok(Some(updated)) => {
                    state.bus.publish_status(
                        job.execution_id,
                        EntityKind::Step,
                        entity_id,
                        updated.status,
                        now,
                    );
                    None
                }
                Ok(None) => Some(reject("unknown step")),
                Err(error) => Some(reject(&error.to_string())),
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads a job when it is currently assigned to the runner.
fn owned_job(state: &AppState, runner: &Runner, job_id: gantry_core::JobId) -> Option<Job> {
    state
        .store
        .job(job_id)
        .ok()
        .flatten()
        .filter(|job| job.runner_id == Some(runner.id))
}

/// Builds an error reply frame.
fn reject(message: &str) -> ServerFrame {
    ServerFrame::Error {
        message: message.to_string(),
    }
}
