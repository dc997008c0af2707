// crates/gantry-server/tests/launcher_unit.rs
// ============================================================================
// Module: Execution Launcher Unit Tests
// Description: Trigger-info freezing, admission effects, and retry rules.
// Purpose: Validate orchestration around atomic plan commits.
// ============================================================================

//! Execution launcher tests.

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

use gantry_core::CommitInfo;
use gantry_core::ControlPlaneStore;
use gantry_core::InMemoryStore;
use gantry_core::NewConfig;
use gantry_core::NewPipeline;
use gantry_core::NewTenant;
use gantry_core::Pipeline;
use gantry_core::PipelineConfigRecord;
use gantry_core::PushEvent;
use gantry_core::RunStatus;
use gantry_core::StoreError;
use gantry_core::Tenant;
use gantry_core::TenantPlan;
use gantry_core::TenantQuotas;
use gantry_core::Timestamp;
use gantry_core::TriggerType;
use gantry_core::UserId;
use gantry_server::bus::LogBus;
use gantry_server::planner::ExecutionLauncher;
use gantry_server::registry::RunnerRegistry;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn now() -> Timestamp {
    Timestamp::from_unix_millis(77_000)
}

struct Fixture {
    store: Arc<InMemoryStore>,
    launcher: ExecutionLauncher,
    pipeline: Pipeline,
    config: PipelineConfigRecord,
    tenant: Tenant,
}

fn fixture(yaml: &str) -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let registry = Arc::new(RunnerRegistry::new());
    let bus = Arc::new(LogBus::default());
    let launcher = ExecutionLauncher::new(
        Arc::clone(&store) as Arc<dyn ControlPlaneStore>,
        registry,
        bus,
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

    Fixture {
        store,
        launcher,
        pipeline,
        config,
        tenant,
    }
}

fn push_to(branch: &str) -> PushEvent {
    PushEvent {
        ref_name: format!("refs/heads/{branch}"),
        after: "abc123".to_string(),
        commits: vec![CommitInfo {
            id: "abc123".to_string(),
            message: "fix: parser".to_string(),
            author_name: "Dana".to_string(),
            modified: vec!["src/lib.rs".to_string()],
            ..CommitInfo::default()
        }],
        head_commit: Some(CommitInfo {
            id: "abc123".to_string(),
            message: "fix: parser".to_string(),
            author_name: "Dana".to_string(),
            ..CommitInfo::default()
        }),
        ..PushEvent::default()
    }
}

const SIMPLE: &str = r"
on:
  push:
    branches: [main, 'release/**']
jobs:
  build:
    runs-on: [linux]
    steps:
      - run: make
";

const GROUPED: &str = r"
on: push
concurrency:
  group: deploy
  cancel-in-progress: true
jobs:
  deploy:
    runs-on: [linux]
    steps:
      - run: make deploy
";

// ============================================================================
// SECTION: Push Launches
// ============================================================================

#[test]
fn push_launch_freezes_trigger_info() {
    let fixture = fixture(SIMPLE);
    let event = push_to("main");
    let execution = fixture
        .launcher
        .launch_for_push(&fixture.pipeline, &fixture.config, &event, None, now())
        .unwrap()
        .unwrap();

    assert_eq!(execution.number, 1);
    assert_eq!(execution.trigger_type, TriggerType::Push);
    assert_eq!(execution.status, RunStatus::Pending);
    assert_eq!(execution.trigger_info.get("branch"), Some(&json!("main")));
    assert_eq!(
        execution.trigger_info.get("commit_sha"),
        Some(&json!("abc123"))
    );
    assert_eq!(execution.trigger_info.get("author"), Some(&json!("Dana")));
    assert_eq!(execution.config_id, Some(fixture.config.id));
    assert_eq!(execution.tenant_id, fixture.tenant.id);

    // The pipeline's last-execution time was touched.
    let pipeline = fixture
        .store
        .pipeline(fixture.tenant.id, fixture.pipeline.id)
        .unwrap()
        .unwrap();
    assert_eq!(pipeline.last_execution_at, Some(now()));
}

#[test]
fn deleted_ref_pushes_never_launch() {
    let fixture = fixture(SIMPLE);
    let mut event = push_to("main");
    event.deleted = true;
    let execution = fixture
        .launcher
        .launch_for_push(&fixture.pipeline, &fixture.config, &event, None, now())
        .unwrap();
    assert!(execution.is_none());
}

// ============================================================================
// SECTION: Concurrency Admission
// ============================================================================

#[test]
fn cancel_in_progress_admission_cancels_older_run() {
    let fixture = fixture(GROUPED);
    let first = fixture
        .launcher
        .launch_for_push(&fixture.pipeline, &fixture.config, &push_to("main"), None, now())
        .unwrap()
        .unwrap();
    let second = fixture
        .launcher
        .launch_for_push(&fixture.pipeline, &fixture.config, &push_to("main"), None, now())
        .unwrap()
        .unwrap();

    let first_reloaded = fixture.store.execution(first.id).unwrap().unwrap();
    assert_eq!(first_reloaded.status, RunStatus::Cancelled);
    assert!(first_reloaded.finished_at.is_some());

    let second_reloaded = fixture.store.execution(second.id).unwrap().unwrap();
    assert_eq!(second_reloaded.status, RunStatus::Pending);
    assert_eq!(second_reloaded.number, 2);
}

// ============================================================================
// SECTION: Retry
// ============================================================================

#[test]
fn retry_requires_a_terminal_execution() {
    let fixture = fixture(SIMPLE);
    let execution = fixture
        .launcher
        .launch_for_push(&fixture.pipeline, &fixture.config, &push_to("main"), None, now())
        .unwrap()
        .unwrap();

    let premature = fixture.launcher.retry_execution(execution.id, None, now());
    assert!(matches!(premature, Err(StoreError::Invalid(_))));
}

#[test]
fn retry_allocates_the_next_number() {
    let fixture = fixture(SIMPLE);
    let first = fixture
        .launcher
        .launch_for_push(&fixture.pipeline, &fixture.config, &push_to("main"), None, now())
        .unwrap()
        .unwrap();
    let second = fixture
        .launcher
        .launch_for_push(&fixture.pipeline, &fixture.config, &push_to("release/1.0"), None, now())
        .unwrap()
        .unwrap();
    assert_eq!((first.number, second.number), (1, 2));

    fixture
        .store
        .update_execution_status(second.id, RunStatus::Failed, now())
        .unwrap();

    let retried = fixture
        .launcher
        .retry_execution(second.id, Some(UserId::from_raw(9).unwrap()), now())
        .unwrap();
    // max(number)+1, never count+1: numbers are unique forever.
    assert_eq!(retried.number, 3);
    assert_eq!(retried.trigger_type, TriggerType::Manual);
    assert_eq!(
        retried.trigger_info.get("retry_of"),
        Some(&json!(second.id.get()))
    );
    assert_eq!(retried.triggered_by, Some(UserId::from_raw(9).unwrap()));
    assert_eq!(retried.config_id, Some(fixture.config.id));
}

#[test]
fn retry_of_unknown_execution_is_not_found() {
    let fixture = fixture(SIMPLE);
    let missing = gantry_core::ExecutionId::from_raw(9_999).unwrap();
    assert!(matches!(
        fixture.launcher.retry_execution(missing, None, now()),
        Err(StoreError::NotFound(_))
    ));
}
