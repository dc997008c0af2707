// crates/gantry-core/tests/proptest_trigger.rs
// ============================================================================
// Module: Trigger Matcher Property-Based Tests
// Description: Determinism and filter monotonicity of push matching.
// Purpose: Detect nondeterminism and filter-direction violations.
// ============================================================================

//! Property-based tests for trigger matcher invariants.

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

use gantry_core::CommitInfo;
use gantry_core::PushEvent;
use gantry_core::PushFilter;
use gantry_core::TriggerSpec;
use gantry_core::trigger::matches_push;
use proptest::prelude::*;

// ============================================================================
// SECTION: Strategies
// ============================================================================

fn branch_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}(/[a-z]{1,8}){0,2}"
}

fn pattern_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        branch_strategy(),
        branch_strategy().prop_map(|base| format!("{base}/*")),
        branch_strategy().prop_map(|base| format!("{base}/**")),
        Just("**".to_string()),
    ]
}

fn event_for(branch: &str, files: Vec<String>) -> PushEvent {
    PushEvent {
        ref_name: format!("refs/heads/{branch}"),
        after: "abc".to_string(),
        commits: vec![CommitInfo {
            modified: files,
            ..CommitInfo::default()
        }],
        ..PushEvent::default()
    }
}

fn triggers_with(filter: PushFilter) -> TriggerSpec {
    TriggerSpec {
        push: Some(filter),
        ..TriggerSpec::default()
    }
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    /// Matching is a pure function of configuration and event.
    #[test]
    fn matching_is_deterministic(
        branch in branch_strategy(),
        branches in prop::collection::vec(pattern_strategy(), 0..4),
        ignore in prop::collection::vec(pattern_strategy(), 0..4),
        files in prop::collection::vec("[a-z]{1,8}\\.(rs|md)", 0..4),
    ) {
        let triggers = triggers_with(PushFilter {
            branches,
            branches_ignore: ignore,
            ..PushFilter::default()
        });
        let event = event_for(&branch, files);
        let first = matches_push(&triggers, &event);
        let second = matches_push(&triggers, &event);
        prop_assert_eq!(first, second);
    }

    /// Adding a branches-ignore pattern can only shrink the match set.
    #[test]
    fn branches_ignore_only_shrinks(
        branch in branch_strategy(),
        branches in prop::collection::vec(pattern_strategy(), 0..4),
        ignore in prop::collection::vec(pattern_strategy(), 0..3),
        extra in pattern_strategy(),
    ) {
        let before = triggers_with(PushFilter {
            branches: branches.clone(),
            branches_ignore: ignore.clone(),
            ..PushFilter::default()
        });
        let mut wider_ignore = ignore;
        wider_ignore.push(extra);
        let after = triggers_with(PushFilter {
            branches,
            branches_ignore: wider_ignore,
            ..PushFilter::default()
        });
        let event = event_for(&branch, Vec::new());
        // matched(after) implies matched(before).
        prop_assert!(!matches_push(&after, &event) || matches_push(&before, &event));
    }

    /// Adding an entry to an already non-empty branches list can only grow
    /// the match set.
    #[test]
    fn extending_nonempty_branches_only_grows(
        branch in branch_strategy(),
        first in pattern_strategy(),
        rest in prop::collection::vec(pattern_strategy(), 0..3),
        extra in pattern_strategy(),
    ) {
        let mut branches = vec![first];
        branches.extend(rest);
        let before = triggers_with(PushFilter {
            branches: branches.clone(),
            ..PushFilter::default()
        });
        branches.push(extra);
        let after = triggers_with(PushFilter {
            branches,
            ..PushFilter::default()
        });
        let event = event_for(&branch, Vec::new());
        prop_assert!(!matches_push(&before, &event) || matches_push(&after, &event));
    }

    /// Constraining an unconstrained branches list can only shrink the match
    /// set.
    #[test]
    fn constraining_branches_only_shrinks(
        branch in branch_strategy(),
        added in pattern_strategy(),
    ) {
        let unconstrained = triggers_with(PushFilter::default());
        let constrained = triggers_with(PushFilter {
            branches: vec![added],
            ..PushFilter::default()
        });
        let event = event_for(&branch, Vec::new());
        prop_assert!(!matches_push(&constrained, &event) || matches_push(&unconstrained, &event));
    }
}
