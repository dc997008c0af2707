// crates/gantry-webhook/src/event.rs
// ============================================================================
// Module: Webhook Event Parsing
// Description: GitHub payload normalization into core event records.
// Purpose: Keep vendor payload shapes out of the matcher and planner.
// Dependencies: gantry-core, serde_json
// ============================================================================

//! ## Overview
//! Payload fields are extracted defensively: absent or mistyped fields fall
//! back to empty defaults rather than failing the delivery, matching how
//! vendors evolve their payloads. Only `push`, `pull_request`, and `ping`
//! are supported; any other event type parses to `None` and is ignored
//! upstream.

// ============================================================================
// SECTION: Imports
// ============================================================================

use gantry_core::CommitInfo;
use gantry_core::PingEvent;
use gantry_core::PullRequestEvent;
use gantry_core::PushEvent;
use gantry_core::RepositoryInfo;
use gantry_core::SenderInfo;
use gantry_core::WebhookEvent;
use serde_json::Value;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Parses a webhook payload by vendor event type.
///
/// Returns `None` for unsupported event types.
#[must_use]
pub fn parse_event(event_type: &str, payload: &Value) -> Option<WebhookEvent> {
    match event_type {
        "push" => Some(WebhookEvent::Push(parse_push(payload))),
        "pull_request" => Some(WebhookEvent::PullRequest(parse_pull_request(payload))),
        "ping" => Some(WebhookEvent::Ping(parse_ping(payload))),
        _ => None,
    }
}

// ============================================================================
// SECTION: Field Helpers
// ============================================================================

/// Reads a string field, defaulting to empty.
fn text(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Reads a boolean field, defaulting to false.
fn flag(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Reads a string-list field, defaulting to empty.
fn text_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// SECTION: Fragments
// ============================================================================

/// Parses repository information.
fn parse_repository(payload: &Value) -> RepositoryInfo {
    let Some(repository) = payload.get("repository") else {
        return RepositoryInfo::default();
    };
    RepositoryInfo {
        full_name: text(repository, "full_name"),
        clone_url: text(repository, "clone_url"),
        html_url: text(repository, "html_url"),
        default_branch: {
            let branch = text(repository, "default_branch");
            if branch.is_empty() {
                "main".to_string()
            } else {
                branch
            }
        },
        private: flag(repository, "private"),
    }
}

/// Parses the acting user.
fn parse_sender(payload: &Value) -> SenderInfo {
    SenderInfo {
        login: payload
            .get("sender")
            .map(|sender| text(sender, "login"))
            .unwrap_or_default(),
    }
}

/// Parses one commit entry.
fn parse_commit(commit: &Value) -> CommitInfo {
    let author = commit.get("author");
    CommitInfo {
        id: text(commit, "id"),
        message: text(commit, "message"),
        author_name: author.map(|author| text(author, "name")).unwrap_or_default(),
        author_email: author
            .map(|author| text(author, "email"))
            .unwrap_or_default(),
        added: text_list(commit, "added"),
        removed: text_list(commit, "removed"),
        modified: text_list(commit, "modified"),
    }
}

// ============================================================================
// SECTION: Event Parsers
// ============================================================================

/// Parses a push payload.
fn parse_push(payload: &Value) -> PushEvent {
    PushEvent {
        ref_name: text(payload, "ref"),
        before: text(payload, "before"),
        after: text(payload, "after"),
        created: flag(payload, "created"),
        deleted: flag(payload, "deleted"),
        forced: flag(payload, "forced"),
        base_ref: payload
            .get("base_ref")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        commits: payload
            .get("commits")
            .and_then(Value::as_array)
            .map(|commits| commits.iter().map(parse_commit).collect())
            .unwrap_or_default(),
        head_commit: payload
            .get("head_commit")
            .filter(|head| !head.is_null())
            .map(parse_commit),
        repository: parse_repository(payload),
        sender: parse_sender(payload),
    }
}

/// Parses a pull-request payload.
fn parse_pull_request(payload: &Value) -> PullRequestEvent {
    let pull_request = payload.get("pull_request").cloned().unwrap_or(Value::Null);
    let head = pull_request.get("head").cloned().unwrap_or(Value::Null);
    let base = pull_request.get("base").cloned().unwrap_or(Value::Null);

    PullRequestEvent {
        action: text(payload, "action"),
        number: payload.get("number").and_then(Value::as_u64).unwrap_or(0),
        title: text(&pull_request, "title"),
        state: text(&pull_request, "state"),
        merged: flag(&pull_request, "merged"),
        head_sha: text(&head, "sha"),
        head_branch: text(&head, "ref"),
        base_branch: text(&base, "ref"),
        head_repo: head
            .get("repo")
            .map(|repo| text(repo, "full_name"))
            .unwrap_or_default(),
        base_repo: base
            .get("repo")
            .map(|repo| text(repo, "full_name"))
            .unwrap_or_default(),
        repository: parse_repository(payload),
        sender: parse_sender(payload),
    }
}

/// Parses a ping payload.
fn parse_ping(payload: &Value) -> PingEvent {
    PingEvent {
        zen: text(payload, "zen"),
        hook_id: payload.get("hook_id").and_then(Value::as_u64),
    }
}
