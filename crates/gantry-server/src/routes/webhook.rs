// crates/gantry-server/src/routes/webhook.rs
// ============================================================================
// Module: Webhook Ingress
// Description: GitHub webhook endpoint with per-pipeline outcome aggregation.
// Purpose: Verify, parse, match, and plan executions for inbound deliveries.
// Dependencies: axum, gantry-core, gantry-webhook, serde_json, tracing
// ============================================================================

//! ## Overview
//! `POST /webhooks/github` is tenant-blind: the delivery authenticates via
//! per-pipeline webhook secrets, not a resolved tenant context. Processing
//! never returns 500 because of one pipeline's bad configuration — each
//! candidate pipeline is evaluated independently and the handler aggregates
//! the outcomes into one response carrying the count and identifiers of the
//! executions it triggered.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::response::Response;
use gantry_core::DeliveryId;
use gantry_core::Execution;
use gantry_core::WebhookEvent;
use gantry_core::trigger;
use gantry_webhook::parse_event;
use gantry_webhook::verify_for_pipelines;
use serde_json::Value;
use serde_json::json;
use tracing::info;
use tracing::warn;

use crate::AppState;
use crate::error::ApiError;
use crate::telemetry::WebhookOutcome;

// ============================================================================
// SECTION: Headers
// ============================================================================

/// Vendor event-type header.
pub const EVENT_HEADER: &str = "x-github-event";
/// Vendor delivery-id header.
pub const DELIVERY_HEADER: &str = "x-github-delivery";
/// Vendor signature header.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Reads a header as UTF-8, treating absence and junk alike.
fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handles one inbound GitHub webhook delivery.
pub async fn github_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let now = state.now();
    let Some(event_type) = header(&headers, EVENT_HEADER).map(ToString::to_string) else {
        return ApiError::BadRequest("missing event type header".to_string()).into_response();
    };
    let delivery_id = header(&headers, DELIVERY_HEADER).map(DeliveryId::new);
    info!(
        %event_type,
        delivery = delivery_id.as_ref().map_or("", DeliveryId::as_str),
        "webhook received"
    );

    // Ping is acknowledged before any pipeline work.
    if event_type == "ping" {
        state.metrics.record_webhook(&event_type, WebhookOutcome::Pong);
        return Json(json!({"message": "pong"})).into_response();
    }

    let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
        state
            .metrics
            .record_webhook(&event_type, WebhookOutcome::Malformed);
        return ApiError::BadRequest("invalid JSON payload".to_string()).into_response();
    };

    // Candidate pipelines by repository URL variants.
    let needles = repo_needles(&payload);
    let pipelines = match state.store.pipelines_for_repo(&needles) {
        Ok(pipelines) => pipelines,
        Err(error) => return ApiError::from(error).into_response(),
    };
    if pipelines.is_empty() {
        state
            .metrics
            .record_webhook(&event_type, WebhookOutcome::Processed);
        return Json(json!({
            "message": "no matching pipelines found",
            "executions_triggered": 0,
            "execution_ids": [],
        }))
        .into_response();
    }

    // Signature resolution across candidates.
    let signature = header(&headers, SIGNATURE_HEADER);
    let verified = verify_for_pipelines(
        &body,
        signature,
        &pipelines,
        &state.config.github_webhook_secret,
    );
    if verified.is_none() {
        state
            .metrics
            .record_webhook(&event_type, WebhookOutcome::Rejected);
        warn!(
            delivery = delivery_id.as_ref().map_or("", DeliveryId::as_str),
            "webhook signature verification failed"
        );
        return ApiError::Unauthorized.into_response();
    }

    let Some(event) = parse_event(&event_type, &payload) else {
        state
            .metrics
            .record_webhook(&event_type, WebhookOutcome::Ignored);
        return Json(json!({
            "message": format!("event type {event_type} is not supported"),
            "executions_triggered": 0,
            "execution_ids": [],
        }))
        .into_response();
    };

    // Evaluate every candidate independently; one bad config never blocks
    // the others.
    let mut triggered: Vec<Execution> = Vec::new();
    for pipeline in &pipelines {
        let config = match state.store.latest_valid_config(pipeline.id) {
            Ok(Some(config)) => config,
            Ok(None) => {
                warn!(pipeline = %pipeline.name, "no valid configuration, skipping");
                continue;
            }
            Err(error) => {
                warn!(pipeline = %pipeline.name, %error, "config load failed, skipping");
                continue;
            }
        };
        let Some(spec) = config.parsed.as_ref() else {
            continue;
        };

        let launched = match &event {
            WebhookEvent::Push(push) => {
                if !trigger::matches_push(&spec.triggers, push) {
                    continue;
                }
                state.launcher.launch_for_push(
                    pipeline,
                    &config,
                    push,
                    delivery_id.as_ref(),
                    now,
                )
            }
            WebhookEvent::PullRequest(pull_request) => {
                if !trigger::matches_pull_request(&spec.triggers, pull_request) {
                    continue;
                }
                state.launcher.launch_for_pull_request(
                    pipeline,
                    &config,
                    pull_request,
                    delivery_id.as_ref(),
                    now,
                )
            }
            WebhookEvent::Ping(_) => continue,
        };

        match launched {
            Ok(Some(execution)) => triggered.push(execution),
            Ok(None) => {}
            Err(error) => {
                warn!(pipeline = %pipeline.name, %error, "execution planning failed");
            }
        }
    }

    // Drain the execution-ready outbox so fresh work dispatches promptly.
    if let Err(error) = state.scheduler.process_ready_queue(now) {
        warn!(%error, "ready-queue drain failed after webhook");
    }

    state
        .metrics
        .record_webhook(&event_type, WebhookOutcome::Processed);
    Json(json!({
        "message": "webhook processed",
        "delivery_id": delivery_id.as_ref().map(DeliveryId::as_str),
        "event_type": event_type,
        "executions_triggered": triggered.len(),
        "execution_ids": triggered
            .iter()
            .map(|execution| execution.id.get())
            .collect::<Vec<_>>(),
    }))
    .into_response()
}

// ============================================================================
// SECTION: Repository Matching
// ============================================================================

/// Builds the repository URL needles used to find candidate pipelines.
///
/// Both HTTPS and SSH spellings of the same repository must match, so the
/// `owner/repo` path is extracted alongside the raw URLs.
fn repo_needles(payload: &Value) -> Vec<String> {
    let repository = payload.get("repository");
    let clone_url = repository
        .and_then(|repository| repository.get("clone_url"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let html_url = repository
        .and_then(|repository| repository.get("html_url"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut needles = Vec::new();
    for url in [clone_url, html_url] {
        if url.is_empty() {
            continue;
        }
        needles.push(url.to_string());
        if let Some(path) = repo_path(url) {
            needles.push(path);
        }
    }
    needles
}

/// Extracts `owner/repo` from HTTPS and SSH repository URL spellings.
fn repo_path(url: &str) -> Option<String> {
    if !url.contains("github.com") {
        return None;
    }
    let path = if let Some(rest) = url.strip_prefix("git@") {
        rest.split_once(':').map(|(_, path)| path)?
    } else {
        url.strip_prefix("https://github.com/")
            .or_else(|| url.strip_prefix("http://github.com/"))?
    };
    let trimmed = path.trim_end_matches('/').trim_end_matches(".git");
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
