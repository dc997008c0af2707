// crates/gantry-webhook/tests/event_unit.rs
// ============================================================================
// Module: Event Parsing Unit Tests
// Description: Push, pull-request, and ping payload normalization.
// Purpose: Validate derived fields and defensive field extraction.
// ============================================================================

//! Webhook event parsing tests.

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

use gantry_webhook::parse_event;
use gantry_core::WebhookEvent;
use serde_json::json;

// ============================================================================
// SECTION: Push Events
// ============================================================================

#[test]
fn push_payload_normalizes() {
    let payload = json!({
        "ref": "refs/heads/main",
        "before": "000",
        "after": "abc",
        "created": false,
        "deleted": false,
        "forced": true,
        "commits": [
            {
                "id": "abc",
                "message": "fix: edge case",
                "author": {"name": "Dana", "email": "dana@example.com"},
                "added": ["src/new.rs"],
                "removed": [],
                "modified": ["src/lib.rs"],
            },
        ],
        "head_commit": {"id": "abc", "message": "fix: edge case"},
        "repository": {
            "full_name": "acme/app",
            "clone_url": "https://github.com/acme/app.git",
            "default_branch": "main",
            "private": true,
        },
        "sender": {"login": "dana"},
    });

    let Some(WebhookEvent::Push(event)) = parse_event("push", &payload) else {
        panic!("expected a push event");
    };
    assert_eq!(event.branch(), "main");
    assert!(event.is_branch());
    assert!(!event.is_tag());
    assert_eq!(event.commit_sha(), "abc");
    assert!(event.forced);
    assert_eq!(event.repository.full_name, "acme/app");
    assert_eq!(event.sender.login, "dana");
    assert_eq!(event.commits[0].author_name, "Dana");
    assert_eq!(
        event.changed_files(),
        vec!["src/lib.rs".to_string(), "src/new.rs".to_string()]
    );
}

#[test]
fn tag_push_derives_tag_fields() {
    let payload = json!({"ref": "refs/tags/v1.0", "after": "abc"});
    let Some(WebhookEvent::Push(event)) = parse_event("push", &payload) else {
        panic!("expected a push event");
    };
    assert!(event.is_tag());
    assert_eq!(event.tag(), Some("v1.0"));
    assert_eq!(event.branch(), "refs/tags/v1.0");
}

#[test]
fn changed_files_deduplicate_across_commits() {
    let payload = json!({
        "ref": "refs/heads/main",
        "commits": [
            {"added": ["a.rs"], "modified": ["b.rs"]},
            {"modified": ["a.rs", "b.rs"], "removed": ["c.rs"]},
        ],
    });
    let Some(WebhookEvent::Push(event)) = parse_event("push", &payload) else {
        panic!("expected a push event");
    };
    assert_eq!(
        event.changed_files(),
        vec!["a.rs".to_string(), "b.rs".to_string(), "c.rs".to_string()]
    );
}

// ============================================================================
// SECTION: Pull-Request Events
// ============================================================================

#[test]
fn pull_request_payload_normalizes() {
    let payload = json!({
        "action": "opened",
        "number": 42,
        "pull_request": {
            "title": "Add pipeline cache",
            "state": "open",
            "merged": false,
            "head": {
                "sha": "abc",
                "ref": "feature/cache",
                "repo": {"full_name": "fork/app"},
            },
            "base": {
                "ref": "main",
                "repo": {"full_name": "acme/app"},
            },
        },
        "repository": {"full_name": "acme/app"},
        "sender": {"login": "dana"},
    });

    let Some(WebhookEvent::PullRequest(event)) = parse_event("pull_request", &payload) else {
        panic!("expected a pull-request event");
    };
    assert_eq!(event.action, "opened");
    assert_eq!(event.number, 42);
    assert_eq!(event.head_branch, "feature/cache");
    assert_eq!(event.base_branch, "main");
    assert!(event.is_fork());
}

#[test]
fn same_repo_pull_request_is_not_a_fork() {
    let payload = json!({
        "action": "opened",
        "number": 1,
        "pull_request": {
            "head": {"repo": {"full_name": "acme/app"}},
            "base": {"repo": {"full_name": "acme/app"}},
        },
    });
    let Some(WebhookEvent::PullRequest(event)) = parse_event("pull_request", &payload) else {
        panic!("expected a pull-request event");
    };
    assert!(!event.is_fork());
}

// ============================================================================
// SECTION: Ping and Unknown Events
// ============================================================================

#[test]
fn ping_parses_to_a_trivial_record() {
    let payload = json!({"zen": "Design for failure.", "hook_id": 99});
    let Some(WebhookEvent::Ping(event)) = parse_event("ping", &payload) else {
        panic!("expected a ping event");
    };
    assert_eq!(event.zen, "Design for failure.");
    assert_eq!(event.hook_id, Some(99));
}

#[test]
fn unknown_event_types_parse_to_none() {
    assert!(parse_event("issues", &json!({})).is_none());
    assert!(parse_event("workflow_run", &json!({})).is_none());
}

#[test]
fn missing_fields_default_instead_of_failing() {
    let Some(WebhookEvent::Push(event)) = parse_event("push", &json!({})) else {
        panic!("expected a push event");
    };
    assert_eq!(event.ref_name, "");
    assert!(event.commits.is_empty());
    assert!(event.head_commit.is_none());
}
