// crates/gantry-core/src/core/event.rs
// ============================================================================
// Module: Normalized Webhook Events
// Description: Vendor-neutral push, pull-request, and ping event records.
// Purpose: Give the trigger matcher and planner one canonical event shape.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Webhook payloads are normalized into these records before any matching or
//! planning happens. Derived accessors (`branch`, `tag`, `changed_files`,
//! `is_fork`) encode the ref and file-union conventions so downstream code
//! never re-parses raw payload fields.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Shared Payload Fragments
// ============================================================================

/// Ref prefix for branch pushes.
const BRANCH_REF_PREFIX: &str = "refs/heads/";
/// Ref prefix for tag pushes.
const TAG_REF_PREFIX: &str = "refs/tags/";

/// Repository information carried by webhook payloads.
///
/// # Invariants
/// - Fields default to empty when the payload omits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RepositoryInfo {
    /// Full name (`owner/repo`).
    pub full_name: String,
    /// HTTPS clone URL.
    pub clone_url: String,
    /// Web URL.
    pub html_url: String,
    /// Default branch name.
    pub default_branch: String,
    /// Whether the repository is private.
    pub private: bool,
}

/// Sender (acting user) information carried by webhook payloads.
///
/// # Invariants
/// - Fields default to empty when the payload omits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SenderInfo {
    /// Vendor login of the acting user.
    pub login: String,
}

/// One commit carried by a push payload.
///
/// # Invariants
/// - File lists are payload-reported and may overlap across commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CommitInfo {
    /// Commit SHA.
    pub id: String,
    /// Commit message.
    pub message: String,
    /// Author name.
    pub author_name: String,
    /// Author email.
    pub author_email: String,
    /// Files added by the commit.
    pub added: Vec<String>,
    /// Files removed by the commit.
    pub removed: Vec<String>,
    /// Files modified by the commit.
    pub modified: Vec<String>,
}

// ============================================================================
// SECTION: Push Events
// ============================================================================

/// Normalized push event.
///
/// # Invariants
/// - `ref_name` is the full git ref (`refs/heads/...` or `refs/tags/...`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PushEvent {
    /// Full git ref that was pushed.
    pub ref_name: String,
    /// SHA before the push.
    pub before: String,
    /// SHA after the push.
    pub after: String,
    /// Whether the ref was created by this push.
    pub created: bool,
    /// Whether the ref was deleted by this push.
    pub deleted: bool,
    /// Whether the push was forced.
    pub forced: bool,
    /// Base ref for new-branch pushes, when reported.
    pub base_ref: Option<String>,
    /// Commits in the push, oldest first.
    pub commits: Vec<CommitInfo>,
    /// Head commit, when reported.
    pub head_commit: Option<CommitInfo>,
    /// Repository the push landed in.
    pub repository: RepositoryInfo,
    /// Acting user.
    pub sender: SenderInfo,
}

impl PushEvent {
    /// Returns the branch name, stripping `refs/heads/` when present.
    #[must_use]
    pub fn branch(&self) -> &str {
        self.ref_name
            .strip_prefix(BRANCH_REF_PREFIX)
            .unwrap_or(&self.ref_name)
    }

    /// Returns the tag name when this is a tag push.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.ref_name.strip_prefix(TAG_REF_PREFIX)
    }

    /// Returns true when the pushed ref is a tag.
    #[must_use]
    pub fn is_tag(&self) -> bool {
        self.ref_name.starts_with(TAG_REF_PREFIX)
    }

    /// Returns true when the pushed ref is a branch.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.ref_name.starts_with(BRANCH_REF_PREFIX)
    }

    /// Returns the head commit SHA.
    #[must_use]
    pub fn commit_sha(&self) -> &str {
        &self.after
    }

    /// Returns the de-duplicated union of changed files across all commits.
    #[must_use]
    pub fn changed_files(&self) -> Vec<String> {
        let mut files = BTreeSet::new();
        for commit in &self.commits {
            files.extend(commit.added.iter().cloned());
            files.extend(commit.removed.iter().cloned());
            files.extend(commit.modified.iter().cloned());
        }
        files.into_iter().collect()
    }
}

// ============================================================================
// SECTION: Pull-Request Events
// ============================================================================

/// Normalized pull-request event.
///
/// # Invariants
/// - Branch names are bare (no `refs/heads/` prefix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PullRequestEvent {
    /// Vendor action label (`opened`, `synchronize`, ...).
    pub action: String,
    /// Pull-request number.
    pub number: u64,
    /// Pull-request title.
    pub title: String,
    /// Pull-request state (`open`, `closed`).
    pub state: String,
    /// Whether the pull request is merged.
    pub merged: bool,
    /// Head commit SHA.
    pub head_sha: String,
    /// Head branch name.
    pub head_branch: String,
    /// Base branch name.
    pub base_branch: String,
    /// Head repository full name.
    pub head_repo: String,
    /// Base repository full name.
    pub base_repo: String,
    /// Repository the event was delivered for.
    pub repository: RepositoryInfo,
    /// Acting user.
    pub sender: SenderInfo,
}

impl PullRequestEvent {
    /// Returns true when the pull request comes from a fork.
    #[must_use]
    pub fn is_fork(&self) -> bool {
        self.head_repo != self.base_repo
    }
}

// ============================================================================
// SECTION: Ping Events
// ============================================================================

/// Trivial record for vendor ping deliveries.
///
/// # Invariants
/// - Ping events are acknowledged and never trigger pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PingEvent {
    /// Vendor zen string.
    pub zen: String,
    /// Vendor hook identifier, when reported.
    pub hook_id: Option<u64>,
}

// ============================================================================
// SECTION: Event Union
// ============================================================================

/// Union of the normalized webhook events.
///
/// # Invariants
/// - Unknown vendor event types never construct a variant; parsers return
///   `None` for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WebhookEvent {
    /// Push event.
    Push(PushEvent),
    /// Pull-request event.
    PullRequest(PullRequestEvent),
    /// Ping event.
    Ping(PingEvent),
}
