// crates/gantry-core/tests/store_memory_unit.rs
// ============================================================================
// Module: In-Memory Store Unit Tests
// Description: Plan commit, numbering, claims, logs, and group admission.
// Purpose: Validate the reference store's transactional semantics.
// ============================================================================

//! In-memory store tests, including the contention properties the durable
//! store must also uphold.

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

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use gantry_core::ConcurrencyGroup;
use gantry_core::ControlPlaneStore;
use gantry_core::ExecutionPlan;
use gantry_core::InMemoryStore;
use gantry_core::JobKey;
use gantry_core::LogLevel;
use gantry_core::NewPipeline;
use gantry_core::NewRunner;
use gantry_core::NewTenant;
use gantry_core::Pipeline;
use gantry_core::PlannedJob;
use gantry_core::RunStatus;
use gantry_core::RunnerType;
use gantry_core::StepAction;
use gantry_core::StepSpec;
use gantry_core::Tenant;
use gantry_core::TenantPlan;
use gantry_core::TenantQuotas;
use gantry_core::Timestamp;
use gantry_core::TriggerType;
use serde_json::Map;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn now() -> Timestamp {
    Timestamp::from_unix_millis(1_000)
}

fn seed(store: &InMemoryStore) -> (Tenant, Pipeline) {
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
                webhook_secret: String::new(),
            },
            now(),
        )
        .unwrap();
    (tenant, pipeline)
}

fn step(name: &str) -> StepSpec {
    StepSpec {
        name: name.to_string(),
        id: String::new(),
        action: StepAction::Run {
            command: "true".to_string(),
        },
        env: std::collections::BTreeMap::new(),
        working_directory: String::new(),
        shell: "bash".to_string(),
        condition: String::new(),
        continue_on_error: false,
        timeout_minutes: 60,
    }
}

fn planned_job(key: &str) -> PlannedJob {
    PlannedJob {
        job_key: JobKey::new(key),
        name: key.to_string(),
        needs: Vec::new(),
        condition: String::new(),
        matrix_values: Map::new(),
        runs_on: vec!["linux".to_string()],
        container: None,
        services: Vec::new(),
        environment: Map::new(),
        fail_fast: true,
        timeout_minutes: 60,
        steps: vec![step("checkout"), step("build")],
    }
}

fn plan(tenant: &Tenant, pipeline: &Pipeline, group: &str, cancel: bool) -> ExecutionPlan {
    ExecutionPlan {
        tenant_id: tenant.id,
        pipeline_id: pipeline.id,
        config_id: None,
        trigger_type: TriggerType::Push,
        trigger_info: Map::new(),
        inputs: Map::new(),
        concurrency_group: ConcurrencyGroup::new(group),
        cancel_in_progress: cancel,
        triggered_by: None,
        jobs: vec![planned_job("build")],
    }
}

// ============================================================================
// SECTION: Plan Commit
// ============================================================================

#[test]
fn commit_plan_persists_execution_jobs_and_steps() {
    let store = InMemoryStore::new();
    let (tenant, pipeline) = seed(&store);

    let planned = store.commit_plan(&plan(&tenant, &pipeline, "", false), now()).unwrap();
    assert_eq!(planned.execution.number, 1);
    assert_eq!(planned.execution.status, RunStatus::Pending);
    assert_eq!(planned.jobs.len(), 1);

    let steps = store.steps_for_job(planned.jobs[0].id).unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].order, 0);
    assert_eq!(steps[0].name, "checkout");
    assert_eq!(steps[1].order, 1);

    // The outbox carries exactly one execution-ready item.
    assert_eq!(store.dequeue_ready().unwrap(), Some(planned.execution.id));
    assert_eq!(store.dequeue_ready().unwrap(), None);

    // The pipeline's last-execution time is touched in the same commit.
    let reloaded = store.pipeline(tenant.id, pipeline.id).unwrap().unwrap();
    assert_eq!(reloaded.last_execution_at, Some(now()));
}

#[test]
fn numbering_is_unique_under_contention() {
    let store = Arc::new(InMemoryStore::new());
    let (tenant, pipeline) = seed(&store);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let plan = plan(&tenant, &pipeline, "", false);
        handles.push(thread::spawn(move || {
            let mut numbers = Vec::new();
            for _ in 0..25 {
                numbers.push(store.commit_plan(&plan, now()).unwrap().execution.number);
            }
            numbers
        }));
    }

    let mut all: Vec<u64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    all.sort_unstable();
    let expected: Vec<u64> = (1..=200).collect();
    assert_eq!(all, expected);
}

// ============================================================================
// SECTION: Concurrency Groups
// ============================================================================

#[test]
fn group_members_queue_by_default() {
    let store = InMemoryStore::new();
    let (tenant, pipeline) = seed(&store);

    let first = store
        .commit_plan(&plan(&tenant, &pipeline, "deploy", false), now())
        .unwrap();
    let second = store
        .commit_plan(&plan(&tenant, &pipeline, "deploy", false), now())
        .unwrap();

    assert!(second.cancelled.is_empty());
    let first_reloaded = store.execution(first.execution.id).unwrap().unwrap();
    assert_eq!(first_reloaded.status, RunStatus::Pending);

    let in_flight = store
        .executions_in_group(pipeline.id, &ConcurrencyGroup::new("deploy"))
        .unwrap();
    assert_eq!(in_flight.len(), 2);
}

#[test]
fn cancel_in_progress_cancels_older_members() {
    let store = InMemoryStore::new();
    let (tenant, pipeline) = seed(&store);

    let first = store
        .commit_plan(&plan(&tenant, &pipeline, "deploy", true), now())
        .unwrap();
    let second = store
        .commit_plan(&plan(&tenant, &pipeline, "deploy", true), now())
        .unwrap();

    assert_eq!(second.cancelled.len(), 1);
    assert_eq!(second.cancelled[0].execution_id, first.execution.id);

    let first_reloaded = store.execution(first.execution.id).unwrap().unwrap();
    assert_eq!(first_reloaded.status, RunStatus::Cancelled);
    assert!(first_reloaded.finished_at.is_some());

    let first_job = store.job(first.jobs[0].id).unwrap().unwrap();
    assert_eq!(first_job.status, RunStatus::Cancelled);

    // At most one non-terminal execution remains in the group.
    let in_flight = store
        .executions_in_group(pipeline.id, &ConcurrencyGroup::new("deploy"))
        .unwrap();
    assert_eq!(in_flight.len(), 1);
    assert_eq!(in_flight[0].id, second.execution.id);
}

// ============================================================================
// SECTION: Dispatch Claims
// ============================================================================

#[test]
fn claim_is_at_most_once_under_contention() {
    let store = Arc::new(InMemoryStore::new());
    let (tenant, pipeline) = seed(&store);
    let planned = store.commit_plan(&plan(&tenant, &pipeline, "", false), now()).unwrap();
    let job_id = planned.jobs[0].id;
    store.mark_job_queued(job_id, now()).unwrap();

    let runner = store
        .create_runner(
            NewRunner {
                tenant_id: Some(tenant.id),
                name: "runner-1".to_string(),
                token_hash: "hash-1".to_string(),
                runner_type: RunnerType::Dedicated,
                labels: vec!["linux".to_string()],
                max_concurrent_jobs: 2,
                version: "1.0".to_string(),
            },
            now(),
        )
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let runner_id = runner.id;
        handles.push(thread::spawn(move || {
            store.claim_job(job_id, runner_id, now()).unwrap()
        }));
    }
    let wins: usize = handles
        .into_iter()
        .map(|handle| usize::from(handle.join().unwrap()))
        .sum();
    assert_eq!(wins, 1);

    let reloaded_runner = store.runner(runner.id).unwrap().unwrap();
    assert_eq!(reloaded_runner.current_jobs, 1);
    let reloaded_job = store.job(job_id).unwrap().unwrap();
    assert_eq!(reloaded_job.runner_id, Some(runner.id));
}

#[test]
fn release_rolls_back_a_claim() {
    let store = InMemoryStore::new();
    let (tenant, pipeline) = seed(&store);
    let planned = store.commit_plan(&plan(&tenant, &pipeline, "", false), now()).unwrap();
    let job_id = planned.jobs[0].id;
    store.mark_job_queued(job_id, now()).unwrap();

    let runner = store
        .create_runner(
            NewRunner {
                tenant_id: None,
                name: "shared-1".to_string(),
                token_hash: "hash-2".to_string(),
                runner_type: RunnerType::Shared,
                labels: vec!["linux".to_string()],
                max_concurrent_jobs: 1,
                version: "1.0".to_string(),
            },
            now(),
        )
        .unwrap();

    assert!(store.claim_job(job_id, runner.id, now()).unwrap());
    store.release_job(job_id, runner.id).unwrap();

    let job = store.job(job_id).unwrap().unwrap();
    assert_eq!(job.status, RunStatus::Queued);
    assert_eq!(job.runner_id, None);
    assert_eq!(store.runner(runner.id).unwrap().unwrap().current_jobs, 0);

    // The job is claimable again after the rollback.
    assert!(store.claim_job(job_id, runner.id, now()).unwrap());
}

// ============================================================================
// SECTION: Log Chunk Allocation
// ============================================================================

#[test]
fn chunk_numbers_are_gapless_per_step() {
    let store = Arc::new(InMemoryStore::new());
    let (tenant, pipeline) = seed(&store);
    let planned = store.commit_plan(&plan(&tenant, &pipeline, "", false), now()).unwrap();
    let steps = store.steps_for_job(planned.jobs[0].id).unwrap();
    let step_id = steps[0].id;

    let mut handles = Vec::new();
    for worker in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for line in 0..25 {
                store
                    .append_log_chunk(
                        step_id,
                        format!("worker {worker} line {line}"),
                        LogLevel::Info,
                        now(),
                    )
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let backlog = store
        .log_backlog(planned.execution.id, Some(planned.jobs[0].id), 1_000)
        .unwrap();
    let numbers: Vec<u64> = backlog
        .iter()
        .filter(|record| record.chunk.step_id == step_id)
        .map(|record| record.chunk.chunk_number)
        .collect();
    let unique: BTreeSet<u64> = numbers.iter().copied().collect();
    assert_eq!(numbers.len(), 100);
    assert_eq!(unique.len(), 100);
    assert_eq!(*unique.iter().next().unwrap(), 0);
    assert_eq!(*unique.iter().next_back().unwrap(), 99);
}

#[test]
fn backlog_orders_by_job_step_then_chunk() {
    let store = InMemoryStore::new();
    let (tenant, pipeline) = seed(&store);
    let planned = store.commit_plan(&plan(&tenant, &pipeline, "", false), now()).unwrap();
    let steps = store.steps_for_job(planned.jobs[0].id).unwrap();

    // Interleave appends across the two steps.
    store
        .append_log_chunk(steps[1].id, "b0".to_string(), LogLevel::Info, now())
        .unwrap();
    store
        .append_log_chunk(steps[0].id, "a0".to_string(), LogLevel::Info, now())
        .unwrap();
    store
        .append_log_chunk(steps[1].id, "b1".to_string(), LogLevel::Info, now())
        .unwrap();
    store
        .append_log_chunk(steps[0].id, "a1".to_string(), LogLevel::Info, now())
        .unwrap();

    let backlog = store.log_backlog(planned.execution.id, None, 1_000).unwrap();
    let contents: Vec<&str> = backlog
        .iter()
        .map(|record| record.chunk.content.as_str())
        .collect();
    assert_eq!(contents, vec!["a0", "a1", "b0", "b1"]);
}

// ============================================================================
// SECTION: Runner Lifecycle
// ============================================================================

#[test]
fn heartbeat_flips_offline_runner_online() {
    let store = InMemoryStore::new();
    let (tenant, _pipeline) = seed(&store);
    let runner = store
        .create_runner(
            NewRunner {
                tenant_id: Some(tenant.id),
                name: "runner-1".to_string(),
                token_hash: "hash-3".to_string(),
                runner_type: RunnerType::SelfHosted,
                labels: Vec::new(),
                max_concurrent_jobs: 2,
                version: "1.0".to_string(),
            },
            now(),
        )
        .unwrap();
    assert_eq!(runner.status, gantry_core::RunnerStatus::Offline);

    let updated = store
        .update_runner_heartbeat(runner.id, Map::new(), 0, now())
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, gantry_core::RunnerStatus::Online);
    assert_eq!(updated.last_heartbeat, Some(now()));
}

#[test]
fn requeue_resets_in_flight_jobs_and_counter() {
    let store = InMemoryStore::new();
    let (tenant, pipeline) = seed(&store);
    let planned = store.commit_plan(&plan(&tenant, &pipeline, "", false), now()).unwrap();
    let job_id = planned.jobs[0].id;
    store.mark_job_queued(job_id, now()).unwrap();

    let runner = store
        .create_runner(
            NewRunner {
                tenant_id: Some(tenant.id),
                name: "runner-1".to_string(),
                token_hash: "hash-4".to_string(),
                runner_type: RunnerType::Dedicated,
                labels: vec!["linux".to_string()],
                max_concurrent_jobs: 2,
                version: "1.0".to_string(),
            },
            now(),
        )
        .unwrap();
    assert!(store.claim_job(job_id, runner.id, now()).unwrap());
    store
        .update_job_status(job_id, RunStatus::Running, None, now())
        .unwrap();

    let requeued = store.requeue_runner_jobs(runner.id, now()).unwrap();
    assert_eq!(requeued, vec![job_id]);

    let job = store.job(job_id).unwrap().unwrap();
    assert_eq!(job.status, RunStatus::Pending);
    assert_eq!(job.runner_id, None);
    assert_eq!(store.runner(runner.id).unwrap().unwrap().current_jobs, 0);
}
