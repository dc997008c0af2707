// crates/gantry-server/src/routes/mod.rs
// ============================================================================
// Module: HTTP Routes
// Description: Router assembly for ingress and WebSocket surfaces.
// Purpose: Wire handlers onto the in-scope endpoints.
// Dependencies: axum, crate::{AppState, routes::*}
// ============================================================================

//! ## Overview
//! The in-scope surface: webhook ingress, a health probe, the runner
//! session socket, and the log subscription sockets. The REST CRUD surface
//! and the login endpoints are external collaborators that mount alongside
//! these routes in a full deployment.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Artifact download handoff.
pub mod artifact;
/// Webhook ingress.
pub mod webhook;
/// WebSocket upgrades.
pub mod ws;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde_json::json;

use crate::AppState;
use crate::error::ApiError;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the application router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks/github", post(webhook::github_webhook))
        .route("/healthz", get(health))
        .route("/artifacts/{artifact_id}/download", get(artifact::download))
        .route("/ws/runner/{runner_id}", get(ws::runner_socket))
        .route("/ws/logs/{execution_id}", get(ws::execution_logs))
        .route("/ws/logs/{execution_id}/{job_id}", get(ws::job_logs))
        .with_state(state)
}

/// Liveness and readiness probe.
async fn health(State(state): State<Arc<AppState>>) -> Response {
    match state.store.readiness() {
        Ok(()) => Json(json!({
            "status": "ok",
            "live_runner_sessions": state.registry.live_sessions(),
        }))
        .into_response(),
        Err(_) => ApiError::Transient.into_response(),
    }
}
