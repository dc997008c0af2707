// crates/gantry-server/src/routes/ws.rs
// ============================================================================
// Module: WebSocket Upgrade Routes
// Description: Runner session and log subscription endpoints.
// Purpose: Authenticate upgrades and hand sockets to their session loops.
// Dependencies: axum, futures-util, gantry-core, serde_json, tokio, tracing
// ============================================================================

//! ## Overview
//! Two upgrade surfaces exist. `/ws/runner/{runner_id}?token=...` opens the
//! persistent runner channel after constant-time token verification.
//! `/ws/logs/{execution_id}[/{job_id}]` streams logs to authorized
//! subscribers: the subscriber's tenant must own the execution. A new
//! subscriber first receives the bounded historical backlog in
//! `(job, step order, chunk number)` order, then a `history_complete`
//! marker, then live frames. Delivery is best-effort; a slow subscriber
//! drops frames but never stalls a publisher.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::response::Response;
use futures_util::SinkExt;
use futures_util::StreamExt;
use gantry_core::ExecutionId;
use gantry_core::JobId;
use gantry_core::RunnerId;
use serde_json::json;
use tracing::debug;
use tracing::warn;

use crate::AppState;
use crate::auth::AuthContext;
use crate::bus::BusFrame;
use crate::bus::execution_topic;
use crate::bus::job_topic;
use crate::error::ApiError;
use crate::session::authenticate_runner;
use crate::session::run_runner_session;
use crate::tenant::API_KEY_HEADER;
use crate::tenant::resolve_tenant;

// ============================================================================
// SECTION: Runner Endpoint
// ============================================================================

/// Upgrades `/ws/runner/{runner_id}?token=...` into a runner session.
pub async fn runner_socket(
    State(state): State<Arc<AppState>>,
    Path(runner_id): Path<u64>,
    Query(params): Query<HashMap<String, String>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let token = params.get("token").cloned().unwrap_or_default();
    let Some(runner) = authenticate_runner(&state, RunnerId::from_raw(runner_id), &token)
    else {
        return ApiError::Unauthorized.into_response();
    };
    upgrade.on_upgrade(move |socket| run_runner_session(state, socket, runner))
}

// ============================================================================
// SECTION: Log Endpoints
// ============================================================================

/// Upgrades `/ws/logs/{execution_id}` into an execution-wide log stream.
pub async fn execution_logs(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<u64>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    upgrade: WebSocketUpgrade,
) -> Response {
    log_upgrade(state, execution_id, None, &params, &headers, upgrade)
}

/// Upgrades `/ws/logs/{execution_id}/{job_id}` into a job-scoped log stream.
pub async fn job_logs(
    State(state): State<Arc<AppState>>,
    Path((execution_id, job_id)): Path<(u64, u64)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    upgrade: WebSocketUpgrade,
) -> Response {
    log_upgrade(state, execution_id, Some(job_id), &params, &headers, upgrade)
}

/// Authorizes a log subscription and performs the upgrade.
fn log_upgrade(
    state: Arc<AppState>,
    execution_id: u64,
    job_id: Option<u64>,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
    upgrade: WebSocketUpgrade,
) -> Response {
    let now = state.now();
    let Some(execution_id) = ExecutionId::from_raw(execution_id) else {
        return ApiError::NotFound.into_response();
    };
    let job_id = match job_id {
        None => None,
        Some(raw) => match JobId::from_raw(raw) {
            Some(job_id) => Some(job_id),
            None => return ApiError::NotFound.into_response(),
        },
    };

    // Browser clients cannot set headers on upgrades, so the API key is
    // accepted from the query string as well.
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
        .or_else(|| params.get("api_key").cloned());
    let context = match resolve_tenant(
        state.store.as_ref(),
        &state.config,
        &AuthContext::default(),
        api_key.as_deref(),
        headers
            .get(axum::http::header::HOST)
            .and_then(|value| value.to_str().ok()),
        now,
    ) {
        Ok(Some(context)) => context,
        Ok(None) => return ApiError::Unauthorized.into_response(),
        Err(error) => return ApiError::from(error).into_response(),
    };

    // Tenant isolation: the subscriber must own the execution.
    let execution = match state.store.execution(execution_id) {
        Ok(Some(execution)) => execution,
        Ok(None) => return ApiError::NotFound.into_response(),
        Err(error) => return ApiError::from(error).into_response(),
    };
    if execution.tenant_id != context.tenant.id {
        // Indistinguishable from a missing execution.
        return ApiError::NotFound.into_response();
    }

    upgrade.on_upgrade(move |socket| run_log_session(state, socket, execution_id, job_id))
}

/// Serves one log subscription: backlog, marker, then live frames.
async fn run_log_session(
    state: Arc<AppState>,
    socket: WebSocket,
    execution_id: ExecutionId,
    job_id: Option<JobId>,
) {
    let topic = job_id.map_or_else(|| execution_topic(execution_id), job_topic);
    // Subscribe before reading the backlog so no frame falls between them.
    let mut live = state.bus.subscribe(&topic);

    let (mut sink, mut stream) = socket.split();

    let connected = json!({
        "type": "connected",
        "execution_id": execution_id.get(),
        "job_id": job_id.map(JobId::get),
    });
    if sink
        .send(Message::Text(connected.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    // Historical backlog, bounded and ordered.
    let backlog = match state
        .store
        .log_backlog(execution_id, job_id, state.config.log_backlog_limit)
    {
        Ok(backlog) => backlog,
        Err(error) => {
            warn!(%error, "log backlog read failed");
            Vec::new()
        }
    };
    let count = backlog.len();
    for record in backlog {
        let frame = BusFrame::Log {
            job_id: record.job_id,
            step_id: record.chunk.step_id,
            content: record.chunk.content,
            level: record.chunk.level,
            timestamp: record.chunk.timestamp,
        };
        if send_frame(&mut sink, &frame).await.is_err() {
            return;
        }
    }
    if send_frame(&mut sink, &BusFrame::HistoryComplete { count })
        .await
        .is_err()
    {
        return;
    }

    // Live delivery until either side drops. Lagged receivers skip ahead.
    loop {
        tokio::select! {
            frame = live.recv() => {
                match frame {
                    Ok(frame) => {
                        if send_frame(&mut sink, &frame).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        debug!(missed, "log subscriber lagged, frames dropped");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        // Keepalive: a textual ping elicits a pong.
                        if text.as_str().contains("\"ping\"")
                            && sink
                                .send(Message::Text(json!({"type": "pong"}).to_string().into()))
                                .await
                                .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    state.bus.prune();
}

/// Serializes and sends one frame.
async fn send_frame(
    sink: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    frame: &BusFrame,
) -> Result<(), axum::Error> {
    let Ok(text) = serde_json::to_string(frame) else {
        return Ok(());
    };
    sink.send(Message::Text(text.into())).await
}
