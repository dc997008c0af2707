// crates/gantry-server/tests/webhook_flow.rs
// ============================================================================
// Module: Webhook Flow Tests
// Description: End-to-end delivery handling through the ingress handler.
// Purpose: Validate verify, parse, match, plan, and outcome aggregation.
// ============================================================================

//! Webhook ingress flow tests over in-memory state.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;

use axum::body::Bytes;
use axum::body::to_bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use gantry_core::ControlPlaneStore;
use gantry_core::InMemoryStore;
use gantry_core::NewConfig;
use gantry_core::NewPipeline;
use gantry_core::NewTenant;
use gantry_core::RunStatus;
use gantry_core::TenantPlan;
use gantry_core::TenantQuotas;
use gantry_core::Timestamp;
use gantry_server::AppState;
use gantry_server::Config;
use gantry_server::routes::webhook::github_webhook;
use gantry_webhook::compute_signature;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const WORKFLOW: &str = r"
name: CI
on:
  push:
    branches: [main, 'release/**']
    paths-ignore: ['**/*.md']
jobs:
  build:
    runs-on: [linux]
    steps:
      - run: make build
";

fn now() -> Timestamp {
    Timestamp::from_unix_millis(1_000)
}

fn state_with_pipeline(webhook_secret: &str) -> Arc<AppState> {
    let store = Arc::new(InMemoryStore::new());
    let tenant = store
        .create_tenant(
            NewTenant {
                name: "Acme".to_string(),
                slug: "acme".to_string(),
                plan: TenantPlan::Pro,
                quotas: TenantQuotas::default(),
            },
            now(),
        )
        .unwrap();
    let pipeline = store
        .create_pipeline(
            NewPipeline {
                tenant_id: tenant.id,
                name: "Backend".to_string(),
                slug: "backend".to_string(),
                repo_url: "https://github.com/acme/backend.git".to_string(),
                default_branch: "main".to_string(),
                config_path: ".gantry/pipeline.yml".to_string(),
                webhook_secret: webhook_secret.to_string(),
            },
            now(),
        )
        .unwrap();
    let outcome = gantry_config::load_workflow(WORKFLOW);
    assert!(outcome.is_valid());
    store
        .insert_config(
            NewConfig {
                pipeline_id: pipeline.id,
                yaml_raw: WORKFLOW.to_string(),
                parsed: outcome.spec,
                commit_sha: "abc".to_string(),
                is_valid: true,
                validation_errors: Vec::new(),
            },
            now(),
        )
        .unwrap();

    AppState::new(Config::default(), store as Arc<dyn ControlPlaneStore>)
}

fn push_payload(ref_name: &str, files: &[&str]) -> Value {
    json!({
        "ref": ref_name,
        "before": "000",
        "after": "abc123",
        "commits": [{
            "id": "abc123",
            "message": "change",
            "author": {"name": "Dana", "email": "dana@example.com"},
            "modified": files,
        }],
        "head_commit": {"id": "abc123", "message": "change"},
        "repository": {
            "full_name": "acme/backend",
            "clone_url": "https://github.com/acme/backend.git",
            "default_branch": "main",
        },
        "sender": {"login": "dana"},
    })
}

fn headers(event: &str, body: &[u8], secret: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-github-event",
        HeaderValue::from_str(event).unwrap(),
    );
    headers.insert(
        "x-github-delivery",
        HeaderValue::from_static("delivery-1"),
    );
    if let Some(secret) = secret {
        let signature = format!("sha256={}", compute_signature(secret, body));
        headers.insert(
            "x-hub-signature-256",
            HeaderValue::from_str(&signature).unwrap(),
        );
    }
    headers
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// SECTION: Trigger Scenarios
// ============================================================================

#[tokio::test]
async fn push_to_listed_branch_triggers_one_execution() {
    let state = state_with_pipeline("s3cret");
    let body = serde_json::to_vec(&push_payload("refs/heads/main", &["src/x.go"])).unwrap();
    let headers = headers("push", &body, Some("s3cret"));

    let response = github_webhook(State(Arc::clone(&state)), headers, Bytes::from(body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let reply = body_json(response).await;
    assert_eq!(reply["executions_triggered"], json!(1));
    let execution_id = reply["execution_ids"][0].as_u64().unwrap();

    let execution = state
        .store
        .execution(gantry_core::ExecutionId::from_raw(execution_id).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(execution.trigger_info["branch"], json!("main"));
    assert_eq!(execution.trigger_type.as_str(), "push");
    // No runner is connected, so the job is queued and stays queued.
    let jobs = state.store.jobs_for_execution(execution.id).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, RunStatus::Queued);
}

#[tokio::test]
async fn docs_only_push_is_suppressed_by_paths_ignore() {
    let state = state_with_pipeline("s3cret");
    let body =
        serde_json::to_vec(&push_payload("refs/heads/main", &["README.md", "docs/a.md"]))
            .unwrap();
    let headers = headers("push", &body, Some("s3cret"));

    let response = github_webhook(State(state), headers, Bytes::from(body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let reply = body_json(response).await;
    assert_eq!(reply["executions_triggered"], json!(0));
}

#[tokio::test]
async fn tag_push_does_not_trigger_branch_only_config() {
    let state = state_with_pipeline("s3cret");
    let body = serde_json::to_vec(&push_payload("refs/tags/v1.0", &["src/x.go"])).unwrap();
    let headers = headers("push", &body, Some("s3cret"));

    let response = github_webhook(State(state), headers, Bytes::from(body)).await;
    let reply = body_json(response).await;
    assert_eq!(reply["executions_triggered"], json!(0));
}

// ============================================================================
// SECTION: Protocol Behavior
// ============================================================================

#[tokio::test]
async fn ping_is_acknowledged_with_pong() {
    let state = state_with_pipeline("s3cret");
    let body = serde_json::to_vec(&json!({"zen": "Keep it simple.", "hook_id": 1})).unwrap();
    let headers = headers("ping", &body, None);

    let response = github_webhook(State(state), headers, Bytes::from(body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let reply = body_json(response).await;
    assert_eq!(reply["message"], json!("pong"));
}

#[tokio::test]
async fn bad_signature_is_unauthorized() {
    let state = state_with_pipeline("s3cret");
    let body = serde_json::to_vec(&push_payload("refs/heads/main", &["src/x.go"])).unwrap();
    let headers = headers("push", &body, Some("wrong-secret"));

    let response = github_webhook(State(state), headers, Bytes::from(body)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let state = state_with_pipeline("");
    let body = b"{not json".to_vec();
    let headers = headers("push", &body, None);

    let response = github_webhook(State(state), headers, Bytes::from(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_event_header_is_bad_request() {
    let state = state_with_pipeline("");
    let response = github_webhook(State(state), HeaderMap::new(), Bytes::new()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsupported_event_types_are_ignored_with_200() {
    let state = state_with_pipeline("");
    let body = serde_json::to_vec(&json!({
        "repository": {"clone_url": "https://github.com/acme/backend.git"},
    }))
    .unwrap();
    let headers = headers("issues", &body, None);

    let response = github_webhook(State(state), headers, Bytes::from(body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let reply = body_json(response).await;
    assert_eq!(reply["executions_triggered"], json!(0));
}

#[tokio::test]
async fn unknown_repository_reports_zero_triggers() {
    let state = state_with_pipeline("");
    let mut payload = push_payload("refs/heads/main", &["src/x.go"]);
    payload["repository"]["clone_url"] = json!("https://github.com/other/repo.git");
    payload["repository"]["full_name"] = json!("other/repo");
    let body = serde_json::to_vec(&payload).unwrap();
    let headers = headers("push", &body, None);

    let response = github_webhook(State(state), headers, Bytes::from(body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let reply = body_json(response).await;
    assert_eq!(reply["executions_triggered"], json!(0));
}
