// crates/gantry-core/src/trigger.rs
// ============================================================================
// Module: Trigger Matcher
// Description: Decides whether a webhook event triggers a pipeline.
// Purpose: Apply branch/tag/path filter semantics to normalized events.
// Dependencies: crate::{core, pattern}, tracing
// ============================================================================

//! ## Overview
//! The trigger matcher maps a normalized workflow trigger configuration and
//! a normalized event to a should-trigger decision. Matching is pure: the
//! outcome depends only on the configuration and the event, so repeated
//! evaluations always agree. Ignore filters are applied before positive
//! filters; tag pushes are opt-in via `tags`; path filters only apply when
//! at least one is configured. Pull-request path filters are accepted in
//! configuration but not enforced here because PR payloads carry no file
//! list.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tracing::debug;

use crate::core::event::PullRequestEvent;
use crate::core::event::PushEvent;
use crate::core::event::WebhookEvent;
use crate::core::workflow::PushFilter;
use crate::core::workflow::TriggerSpec;
use crate::pattern::match_list;
use crate::pattern::match_path_list;

// ============================================================================
// SECTION: Push Matching
// ============================================================================

/// Returns true when a push event should trigger the pipeline.
#[must_use]
pub fn matches_push(triggers: &TriggerSpec, event: &PushEvent) -> bool {
    let Some(filter) = triggers.push.as_ref() else {
        return false;
    };
    if filter.is_unconstrained() {
        return true;
    }
    if event.is_tag() {
        matches_tag_push(filter, event)
    } else {
        matches_branch_push(filter, event)
    }
}

/// Applies branch and path filters to a branch push.
fn matches_branch_push(filter: &PushFilter, event: &PushEvent) -> bool {
    let branch = event.branch();

    if !filter.branches_ignore.is_empty() && match_list(branch, &filter.branches_ignore) {
        debug!(branch, "branch matches branches_ignore");
        return false;
    }
    if !filter.branches.is_empty() && !match_list(branch, &filter.branches) {
        debug!(branch, "branch does not match branches filter");
        return false;
    }

    if !filter.paths.is_empty() || !filter.paths_ignore.is_empty() {
        let changed = event.changed_files();

        if !filter.paths_ignore.is_empty() && !changed.is_empty() {
            let all_ignored = changed
                .iter()
                .all(|path| match_path_list(path, &filter.paths_ignore));
            if all_ignored {
                debug!("all changed files match paths_ignore");
                return false;
            }
        }
        if !filter.paths.is_empty() {
            let any_matches = changed
                .iter()
                .any(|path| match_path_list(path, &filter.paths));
            if !any_matches {
                debug!("no changed file matches paths filter");
                return false;
            }
        }
    }

    true
}

/// Applies tag filters to a tag push. Tag pushes are opt-in via `tags`.
fn matches_tag_push(filter: &PushFilter, event: &PushEvent) -> bool {
    let Some(tag) = event.tag() else {
        return false;
    };

    if !filter.tags_ignore.is_empty() && match_list(tag, &filter.tags_ignore) {
        debug!(tag, "tag matches tags_ignore");
        return false;
    }
    if filter.tags.is_empty() {
        debug!(tag, "tag push without tags filter is not triggered");
        return false;
    }
    match_list(tag, &filter.tags)
}

// ============================================================================
// SECTION: Pull-Request Matching
// ============================================================================

/// Returns true when a pull-request event should trigger the pipeline.
///
/// The event's action must be one of the configured `types`; branch filters
/// apply to the base branch. Path filters are not enforced for pull
/// requests.
#[must_use]
pub fn matches_pull_request(triggers: &TriggerSpec, event: &PullRequestEvent) -> bool {
    let Some(filter) = triggers.pull_request.as_ref() else {
        return false;
    };

    if !filter.types.iter().any(|action| action == &event.action) {
        debug!(action = %event.action, "pull-request action not in configured types");
        return false;
    }

    let base = event.base_branch.as_str();
    if !filter.branches_ignore.is_empty() && match_list(base, &filter.branches_ignore) {
        debug!(base, "base branch matches branches_ignore");
        return false;
    }
    if !filter.branches.is_empty() && !match_list(base, &filter.branches) {
        debug!(base, "base branch does not match branches filter");
        return false;
    }

    true
}

// ============================================================================
// SECTION: Event Dispatch
// ============================================================================

/// Returns true when any supported event kind should trigger the pipeline.
///
/// Ping events never trigger.
#[must_use]
pub fn matches_event(triggers: &TriggerSpec, event: &WebhookEvent) -> bool {
    match event {
        WebhookEvent::Push(push) => matches_push(triggers, push),
        WebhookEvent::PullRequest(pull_request) => matches_pull_request(triggers, pull_request),
        WebhookEvent::Ping(_) => false,
    }
}
