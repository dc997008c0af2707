// crates/gantry-core/tests/graph_unit.rs
// ============================================================================
// Module: Job Graph Unit Tests
// Description: Cycle detection, readiness, skip propagation, fail-fast.
// Purpose: Validate dependency rules driving the scheduler.
// ============================================================================

//! Job dependency graph tests.

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

use gantry_core::ExecutionId;
use gantry_core::Job;
use gantry_core::JobId;
use gantry_core::JobKey;
use gantry_core::RunStatus;
use gantry_core::Timestamp;
use gantry_core::graph::Readiness;
use gantry_core::graph::aggregate_status;
use gantry_core::graph::fail_fast_siblings;
use gantry_core::graph::has_cycle;
use gantry_core::graph::readiness;
use gantry_core::graph::ready_jobs;
use gantry_core::graph::skippable_jobs;
use gantry_core::graph::validate_needs;
use serde_json::Map;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn keyed(key: &str, needs: &[&str]) -> (JobKey, Vec<JobKey>) {
    (
        JobKey::new(key),
        needs.iter().map(|need| JobKey::new(*need)).collect(),
    )
}

fn job(raw_id: u64, key: &str, needs: &[&str], status: RunStatus) -> Job {
    Job {
        id: JobId::from_raw(raw_id).unwrap(),
        execution_id: ExecutionId::from_raw(1).unwrap(),
        name: key.to_string(),
        job_key: JobKey::new(key),
        needs: needs.iter().map(|need| JobKey::new(*need)).collect(),
        condition: String::new(),
        matrix_values: Map::new(),
        runs_on: vec!["linux".to_string()],
        container: None,
        services: Vec::new(),
        status,
        runner_id: None,
        timeout_minutes: 60,
        outputs: Map::new(),
        environment: Map::new(),
        queued_at: None,
        started_at: None,
        finished_at: None,
        created_at: Timestamp::from_unix_millis(0),
    }
}

// ============================================================================
// SECTION: Static Validation
// ============================================================================

#[test]
fn unknown_needs_are_reported_per_reference() {
    let jobs = vec![keyed("build", &[]), keyed("test", &["build", "lint"])];
    let errors = validate_needs(&jobs);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("non-existent job 'lint'"));
}

#[test]
fn acyclic_graph_passes() {
    let jobs = vec![
        keyed("build", &[]),
        keyed("test", &["build"]),
        keyed("deploy", &["build", "test"]),
    ];
    assert!(!has_cycle(&jobs));
}

#[test]
fn two_node_cycle_is_detected() {
    // Seed scenario: a needs b, b needs a.
    let jobs = vec![keyed("a", &["b"]), keyed("b", &["a"])];
    assert!(has_cycle(&jobs));
}

#[test]
fn self_loop_is_detected() {
    let jobs = vec![keyed("a", &["a"])];
    assert!(has_cycle(&jobs));
}

#[test]
fn long_cycle_is_detected() {
    let jobs = vec![
        keyed("a", &["c"]),
        keyed("b", &["a"]),
        keyed("c", &["b"]),
        keyed("root", &[]),
    ];
    assert!(has_cycle(&jobs));
}

// ============================================================================
// SECTION: Readiness
// ============================================================================

#[test]
fn job_without_needs_is_ready() {
    let jobs = vec![job(1, "build", &[], RunStatus::Pending)];
    assert_eq!(readiness(&jobs[0], &jobs), Readiness::Ready);
    assert_eq!(ready_jobs(&jobs), vec![jobs[0].id]);
}

#[test]
fn job_waits_for_in_flight_dependencies() {
    let jobs = vec![
        job(1, "build", &[], RunStatus::Running),
        job(2, "test", &["build"], RunStatus::Pending),
    ];
    assert_eq!(readiness(&jobs[1], &jobs), Readiness::Waiting);
    assert!(ready_jobs(&jobs).is_empty());
}

#[test]
fn job_becomes_ready_when_dependencies_succeed() {
    let jobs = vec![
        job(1, "build", &[], RunStatus::Success),
        job(2, "test", &["build"], RunStatus::Pending),
    ];
    assert_eq!(ready_jobs(&jobs), vec![jobs[1].id]);
}

#[test]
fn upstream_failure_skips_dependents() {
    let jobs = vec![
        job(1, "build", &[], RunStatus::Failed),
        job(2, "test", &["build"], RunStatus::Pending),
        job(3, "deploy", &["test"], RunStatus::Pending),
    ];
    assert_eq!(skippable_jobs(&jobs), vec![jobs[1].id]);
}

#[test]
fn skipped_upstream_propagates_down_the_chain() {
    let jobs = vec![
        job(1, "build", &[], RunStatus::Skipped),
        job(2, "test", &["build"], RunStatus::Pending),
    ];
    assert_eq!(readiness(&jobs[1], &jobs), Readiness::Skip);
}

#[test]
fn matrix_dependency_waits_for_every_instance() {
    let jobs = vec![
        job(1, "build", &[], RunStatus::Success),
        job(2, "build", &[], RunStatus::Running),
        job(3, "test", &["build"], RunStatus::Pending),
    ];
    assert_eq!(readiness(&jobs[2], &jobs), Readiness::Waiting);
}

// ============================================================================
// SECTION: Fail-Fast and Aggregation
// ============================================================================

#[test]
fn fail_fast_cancels_not_yet_running_siblings_only() {
    let failed = job(1, "test", &[], RunStatus::Failed);
    let jobs = vec![
        failed.clone(),
        job(2, "test", &[], RunStatus::Pending),
        job(3, "test", &[], RunStatus::Running),
        job(4, "build", &[], RunStatus::Pending),
        job(5, "test", &[], RunStatus::Queued),
    ];
    assert_eq!(
        fail_fast_siblings(&failed, &jobs),
        vec![jobs[1].id, jobs[4].id]
    );
}

#[test]
fn aggregate_status_waits_for_all_terminal() {
    let jobs = vec![
        job(1, "build", &[], RunStatus::Success),
        job(2, "test", &[], RunStatus::Running),
    ];
    assert_eq!(aggregate_status(&jobs), None);
}

#[test]
fn aggregate_status_failure_dominates() {
    let jobs = vec![
        job(1, "build", &[], RunStatus::Success),
        job(2, "test", &[], RunStatus::Failed),
        job(3, "deploy", &[], RunStatus::Skipped),
    ];
    assert_eq!(aggregate_status(&jobs), Some(RunStatus::Failed));
}

#[test]
fn aggregate_status_skipped_jobs_do_not_fail_the_run() {
    let jobs = vec![
        job(1, "build", &[], RunStatus::Success),
        job(2, "docs", &[], RunStatus::Skipped),
    ];
    assert_eq!(aggregate_status(&jobs), Some(RunStatus::Success));
}
