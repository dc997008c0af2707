// crates/gantry-server/tests/scheduler_unit.rs
// ============================================================================
// Module: Scheduler Unit Tests
// Description: Dispatch selection, at-most-once claims, and sweeps.
// Purpose: Validate the queued-to-assigned path over in-memory fixtures.
// ============================================================================

//! Scheduler tests over the in-memory store and a fake session registry.

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

use gantry_core::ControlPlaneStore;
use gantry_core::InMemoryStore;
use gantry_core::NewConfig;
use gantry_core::NewPipeline;
use gantry_core::NewRunner;
use gantry_core::NewTenant;
use gantry_core::Pipeline;
use gantry_core::PipelineConfigRecord;
use gantry_core::RunStatus;
use gantry_core::Runner;
use gantry_core::RunnerType;
use gantry_core::Tenant;
use gantry_core::TenantPlan;
use gantry_core::TenantQuotas;
use gantry_core::Timestamp;
use gantry_core::TriggerType;
use gantry_core::planner::build_plan;
use gantry_server::bus::LogBus;
use gantry_server::protocol::ServerFrame;
use gantry_server::registry::RunnerRegistry;
use gantry_server::registry::SessionHandle;
use gantry_server::scheduler::Scheduler;
use gantry_server::secrets::SecretCipher;
use serde_json::Map;
use tokio::sync::mpsc;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn now() -> Timestamp {
    Timestamp::from_unix_millis(50_000)
}

struct Harness {
    store: Arc<InMemoryStore>,
    registry: Arc<RunnerRegistry>,
    scheduler: Scheduler,
    tenant: Tenant,
    pipeline: Pipeline,
    config: PipelineConfigRecord,
}

fn harness(yaml: &str) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let registry = Arc::new(RunnerRegistry::new());
    let bus = Arc::new(LogBus::default());
    let cipher = Arc::new(SecretCipher::new("master"));
    let scheduler = Scheduler::new(
        Arc::clone(&store) as Arc<dyn ControlPlaneStore>,
        Arc::clone(&registry),
        bus,
        cipher,
        90,
    );

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

    let outcome = gantry_config::load_workflow(yaml);
    assert!(outcome.is_valid(), "fixture yaml invalid: {:?}", outcome.errors);
    let config = store
        .insert_config(
            NewConfig {
                pipeline_id: pipeline.id,
                yaml_raw: yaml.to_string(),
                parsed: outcome.spec,
                commit_sha: "abc".to_string(),
                is_valid: true,
                validation_errors: Vec::new(),
            },
            now(),
        )
        .unwrap();

    Harness {
        store,
        registry,
        scheduler,
        tenant,
        pipeline,
        config,
    }
}

impl Harness {
    fn commit(&self) -> gantry_core::PlannedExecution {
        let spec = self.config.parsed.as_ref().unwrap();
        let plan = build_plan(
            spec,
            self.tenant.id,
            self.pipeline.id,
            Some(self.config.id),
            TriggerType::Push,
            Map::new(),
            Map::new(),
            None,
        );
        self.store.commit_plan(&plan, now()).unwrap()
    }

    fn runner(&self, name: &str, labels: &[&str], capacity: u32) -> Runner {
        self.store
            .create_runner(
                NewRunner {
                    tenant_id: Some(self.tenant.id),
                    name: name.to_string(),
                    token_hash: format!("hash-{name}"),
                    runner_type: RunnerType::Dedicated,
                    labels: labels.iter().map(ToString::to_string).collect(),
                    max_concurrent_jobs: capacity,
                    version: "1.0".to_string(),
                },
                now(),
            )
            .unwrap()
    }

    /// Connects a fake session and returns its outbound frame receiver.
    fn connect(&self, runner: &Runner) -> mpsc::UnboundedReceiver<ServerFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry
            .attach(runner.id, SessionHandle::new(runner.tenant_id, tx));
        self.store
            .update_runner_heartbeat(runner.id, Map::new(), 0, now())
            .unwrap();
        rx
    }
}

const SINGLE_JOB: &str = r"
on: push
jobs:
  build:
    runs-on: [linux]
    steps:
      - run: make
";

const DIAMOND: &str = r"
on: push
jobs:
  build:
    runs-on: [linux]
    steps:
      - run: make build
  test:
    runs-on: [linux]
    needs: [build]
    steps:
      - run: make test
  deploy:
    runs-on: [linux]
    needs: [test]
    steps:
      - run: make deploy
";

const MATRIX_FAIL_FAST: &str = r"
on: push
jobs:
  test:
    runs-on: [linux]
    strategy:
      fail-fast: true
      matrix:
        node: [18, 20, 22]
    steps:
      - run: make test
";

// ============================================================================
// SECTION: Dispatch
// ============================================================================

#[test]
fn ready_jobs_queue_and_dispatch_to_connected_runner() {
    let fixture = harness(SINGLE_JOB);
    let runner = fixture.runner("runner-1", &["linux"], 2);
    let mut frames = fixture.connect(&runner);

    let planned = fixture.commit();
    fixture.scheduler.process_ready_queue(now()).unwrap();

    let job = fixture.store.job(planned.jobs[0].id).unwrap().unwrap();
    assert_eq!(job.status, RunStatus::Queued);
    assert_eq!(job.runner_id, Some(runner.id));

    match frames.try_recv().unwrap() {
        ServerFrame::JobAssignment { job: payload } => {
            assert_eq!(payload.id, planned.jobs[0].id);
            assert_eq!(payload.steps.len(), 1);
        }
        other => panic!("expected a job assignment, got {other:?}"),
    }

    // The execution moved out of pending when scheduled.
    let execution = fixture
        .store
        .execution(planned.execution.id)
        .unwrap()
        .unwrap();
    assert_eq!(execution.status, RunStatus::Queued);
}

#[test]
fn jobs_stay_queued_without_an_assignable_runner() {
    let fixture = harness(SINGLE_JOB);
    // Runner exists but has no session.
    let _runner = fixture.runner("runner-1", &["linux"], 2);

    let planned = fixture.commit();
    fixture.scheduler.process_ready_queue(now()).unwrap();

    let job = fixture.store.job(planned.jobs[0].id).unwrap().unwrap();
    assert_eq!(job.status, RunStatus::Queued);
    assert_eq!(job.runner_id, None);
}

#[test]
fn label_mismatch_excludes_runner() {
    let fixture = harness(SINGLE_JOB);
    let runner = fixture.runner("mac-runner", &["macos"], 2);
    let _frames = fixture.connect(&runner);

    let planned = fixture.commit();
    fixture.scheduler.process_ready_queue(now()).unwrap();

    let job = fixture.store.job(planned.jobs[0].id).unwrap().unwrap();
    assert_eq!(job.runner_id, None);
}

#[test]
fn least_loaded_runner_wins() {
    let fixture = harness(SINGLE_JOB);
    let busy = fixture.runner("busy", &["linux"], 4);
    let idle = fixture.runner("idle", &["linux"], 4);
    let _busy_frames = fixture.connect(&busy);
    let mut idle_frames = fixture.connect(&idle);
    // Pre-load the busy runner.
    fixture
        .store
        .update_runner_heartbeat(busy.id, Map::new(), 3, now())
        .unwrap();

    let planned = fixture.commit();
    fixture.scheduler.process_ready_queue(now()).unwrap();

    let job = fixture.store.job(planned.jobs[0].id).unwrap().unwrap();
    assert_eq!(job.runner_id, Some(idle.id));
    assert!(matches!(
        idle_frames.try_recv().unwrap(),
        ServerFrame::JobAssignment { .. }
    ));
}

#[test]
fn failed_delivery_rolls_back_the_claim() {
    let fixture = harness(SINGLE_JOB);
    let runner = fixture.runner("runner-1", &["linux"], 2);
    // Attach a session whose receiver is immediately dropped: the send
    // fails after the claim succeeds.
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    fixture
        .registry
        .attach(runner.id, SessionHandle::new(runner.tenant_id, tx));
    fixture
        .store
        .update_runner_heartbeat(runner.id, Map::new(), 0, now())
        .unwrap();

    let planned = fixture.commit();
    fixture.scheduler.process_ready_queue(now()).unwrap();

    let job = fixture.store.job(planned.jobs[0].id).unwrap().unwrap();
    assert_eq!(job.status, RunStatus::Queued);
    assert_eq!(job.runner_id, None);
    assert_eq!(
        fixture.store.runner(runner.id).unwrap().unwrap().current_jobs,
        0
    );
}

// ============================================================================
// SECTION: Dependencies
// ============================================================================

#[test]
fn dependents_wait_then_queue_after_success() {
    let fixture = harness(DIAMOND);
    let runner = fixture.runner("runner-1", &["linux"], 4);
    let _frames = fixture.connect(&runner);

    let planned = fixture.commit();
    fixture.scheduler.process_ready_queue(now()).unwrap();

    let build = planned.jobs[0].clone();
    let test = planned.jobs[1].clone();
    assert_eq!(
        fixture.store.job(build.id).unwrap().unwrap().status,
        RunStatus::Queued
    );
    assert_eq!(
        fixture.store.job(test.id).unwrap().unwrap().status,
        RunStatus::Pending
    );

    // Complete the build; the test job becomes ready.
    let finished = fixture
        .store
        .finish_job(build.id, RunStatus::Success, Map::new(), now())
        .unwrap()
        .unwrap();
    fixture.scheduler.on_job_finished(&finished, now()).unwrap();

    assert_eq!(
        fixture.store.job(test.id).unwrap().unwrap().status,
        RunStatus::Queued
    );
}

#[test]
fn upstream_failure_skips_the_whole_downstream_chain() {
    let fixture = harness(DIAMOND);
    let runner = fixture.runner("runner-1", &["linux"], 4);
    let _frames = fixture.connect(&runner);

    let planned = fixture.commit();
    fixture.scheduler.process_ready_queue(now()).unwrap();

    let build = planned.jobs[0].clone();
    let finished = fixture
        .store
        .finish_job(build.id, RunStatus::Failed, Map::new(), now())
        .unwrap()
        .unwrap();
    fixture.scheduler.on_job_finished(&finished, now()).unwrap();

    let test = fixture.store.job(planned.jobs[1].id).unwrap().unwrap();
    let deploy = fixture.store.job(planned.jobs[2].id).unwrap().unwrap();
    assert_eq!(test.status, RunStatus::Skipped);
    assert_eq!(deploy.status, RunStatus::Skipped);
    assert!(test.finished_at.is_some());

    // The execution aggregates to failed once everything is terminal.
    let execution = fixture
        .store
        .execution(planned.execution.id)
        .unwrap()
        .unwrap();
    assert_eq!(execution.status, RunStatus::Failed);
    assert!(execution.finished_at.is_some());
}

#[test]
fn fail_fast_cancels_pending_matrix_siblings() {
    let fixture = harness(MATRIX_FAIL_FAST);
    let runner = fixture.runner("runner-1", &["linux"], 1);
    let _frames = fixture.connect(&runner);

    let planned = fixture.commit();
    assert_eq!(planned.jobs.len(), 3);
    fixture.scheduler.process_ready_queue(now()).unwrap();

    // Capacity one: exactly one instance was assigned.
    let assigned: Vec<_> = planned
        .jobs
        .iter()
        .filter(|job| {
            fixture
                .store
                .job(job.id)
                .unwrap()
                .unwrap()
                .runner_id
                .is_some()
        })
        .collect();
    assert_eq!(assigned.len(), 1);

    let failed = fixture
        .store
        .finish_job(assigned[0].id, RunStatus::Failed, Map::new(), now())
        .unwrap()
        .unwrap();
    fixture.scheduler.on_job_finished(&failed, now()).unwrap();

    // The remaining queued sibling keeps running to completion; only the
    // pending ones cancel. With capacity one, one sibling was still
    // pending and one queued-but-unassigned.
    let mut cancelled = 0;
    for job in &planned.jobs {
        let status = fixture.store.job(job.id).unwrap().unwrap().status;
        if status == RunStatus::Cancelled {
            cancelled += 1;
        }
    }
    assert!(cancelled >= 1, "fail-fast cancelled no siblings");
}

// ============================================================================
// SECTION: Concurrency Groups
// ============================================================================

const GROUPED: &str = r"
on: push
concurrency: deploy
jobs:
  deploy:
    runs-on: [linux]
    steps:
      - run: make deploy
";

#[test]
fn younger_group_member_queues_behind_the_older() {
    let fixture = harness(GROUPED);
    let runner = fixture.runner("runner-1", &["linux"], 4);
    let mut frames = fixture.connect(&runner);

    let first = fixture.commit();
    let second = fixture.commit();
    fixture.scheduler.process_ready_queue(now()).unwrap();

    // The older member runs; the younger holds in pending.
    let first_job = fixture.store.job(first.jobs[0].id).unwrap().unwrap();
    assert_eq!(first_job.status, RunStatus::Queued);
    assert_eq!(first_job.runner_id, Some(runner.id));
    let second_execution = fixture.store.execution(second.execution.id).unwrap().unwrap();
    assert_eq!(second_execution.status, RunStatus::Pending);
    let second_job = fixture.store.job(second.jobs[0].id).unwrap().unwrap();
    assert_eq!(second_job.status, RunStatus::Pending);
    assert!(matches!(
        frames.try_recv().unwrap(),
        ServerFrame::JobAssignment { .. }
    ));

    // Completion of the older member wakes the younger one.
    let finished = fixture
        .store
        .finish_job(first.jobs[0].id, RunStatus::Success, Map::new(), now())
        .unwrap()
        .unwrap();
    fixture.scheduler.on_job_finished(&finished, now()).unwrap();

    let second_job = fixture.store.job(second.jobs[0].id).unwrap().unwrap();
    assert_eq!(second_job.status, RunStatus::Queued);
    assert_eq!(second_job.runner_id, Some(runner.id));
    assert!(matches!(
        frames.try_recv().unwrap(),
        ServerFrame::JobAssignment { .. }
    ));
}

// ============================================================================
// SECTION: Sweeps
// ============================================================================

#[test]
fn offline_sweep_requeues_in_flight_jobs() {
    let fixture = harness(SINGLE_JOB);
    let runner = fixture.runner("runner-1", &["linux"], 2);
    let _frames = fixture.connect(&runner);

    let planned = fixture.commit();
    fixture.scheduler.process_ready_queue(now()).unwrap();
    fixture
        .store
        .update_job_status(planned.jobs[0].id, RunStatus::Running, None, now())
        .unwrap();

    // The runner goes silent past the 90 second threshold.
    fixture.registry.detach(runner.id);
    let later = Timestamp::from_unix_millis(now().as_unix_millis() + 120_000);
    fixture.scheduler.sweep_offline(later).unwrap();

    let reloaded = fixture.store.runner(runner.id).unwrap().unwrap();
    assert_eq!(reloaded.status, gantry_core::RunnerStatus::Offline);
    let job = fixture.store.job(planned.jobs[0].id).unwrap().unwrap();
    assert_eq!(job.status, RunStatus::Queued);
    assert_eq!(job.runner_id, None);
}

#[test]
fn timeout_sweep_times_out_overdue_jobs_and_cancels_on_runner() {
    let fixture = harness(SINGLE_JOB);
    let runner = fixture.runner("runner-1", &["linux"], 2);
    let mut frames = fixture.connect(&runner);

    let planned = fixture.commit();
    fixture.scheduler.process_ready_queue(now()).unwrap();
    fixture
        .store
        .update_job_status(planned.jobs[0].id, RunStatus::Running, None, now())
        .unwrap();
    // Drain the assignment frame.
    let _ = frames.try_recv();

    // 61 minutes later the 60-minute budget is exhausted.
    let later = Timestamp::from_unix_millis(now().as_unix_millis() + 61 * 60 * 1_000);
    fixture.scheduler.sweep_timeouts(later).unwrap();

    let job = fixture.store.job(planned.jobs[0].id).unwrap().unwrap();
    assert_eq!(job.status, RunStatus::Timeout);
    assert!(job.finished_at.is_some());
    assert!(matches!(
        frames.try_recv().unwrap(),
        ServerFrame::JobCancel { .. }
    ));

    let execution = fixture
        .store
        .execution(planned.execution.id)
        .unwrap()
        .unwrap();
    assert_eq!(execution.status, RunStatus::Timeout);
}

#[test]
fn cancel_execution_emits_cancel_frames_to_assigned_runners() {
    let fixture = harness(SINGLE_JOB);
    let runner = fixture.runner("runner-1", &["linux"], 2);
    let mut frames = fixture.connect(&runner);

    let planned = fixture.commit();
    fixture.scheduler.process_ready_queue(now()).unwrap();
    let _ = frames.try_recv();

    let cancelled = fixture
        .scheduler
        .cancel_execution(planned.execution.id, now())
        .unwrap();
    assert_eq!(cancelled, 1);

    let execution = fixture
        .store
        .execution(planned.execution.id)
        .unwrap()
        .unwrap();
    assert_eq!(execution.status, RunStatus::Cancelled);
    assert!(matches!(
        frames.try_recv().unwrap(),
        ServerFrame::JobCancel { .. }
    ));
}
