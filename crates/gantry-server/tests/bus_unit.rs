// crates/gantry-server/tests/bus_unit.rs
// ============================================================================
// Module: Log Bus Unit Tests
// Description: Topic fan-out, per-topic ordering, and slow subscribers.
// Purpose: Validate best-effort delivery semantics.
// ============================================================================

//! Log fan-out bus tests.

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
use gantry_core::JobId;
use gantry_core::LogLevel;
use gantry_core::RunStatus;
use gantry_core::StepId;
use gantry_core::Timestamp;
use gantry_server::bus::BusFrame;
use gantry_server::bus::EntityKind;
use gantry_server::bus::LogBus;
use gantry_server::bus::execution_topic;
use gantry_server::bus::job_topic;
use tokio::sync::broadcast::error::TryRecvError;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn ids() -> (ExecutionId, JobId, StepId) {
    (
        ExecutionId::from_raw(10).unwrap(),
        JobId::from_raw(20).unwrap(),
        StepId::from_raw(30).unwrap(),
    )
}

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

// ============================================================================
// SECTION: Fan-Out
// ============================================================================

#[test]
fn log_frames_reach_both_topic_families() {
    let bus = LogBus::default();
    let (execution_id, job_id, step_id) = ids();
    let mut by_job = bus.subscribe(&job_topic(job_id));
    let mut by_execution = bus.subscribe(&execution_topic(execution_id));

    bus.publish_log(
        execution_id,
        job_id,
        step_id,
        "line".to_string(),
        LogLevel::Info,
        ts(1),
    );

    assert!(matches!(by_job.try_recv().unwrap(), BusFrame::Log { .. }));
    assert!(matches!(
        by_execution.try_recv().unwrap(),
        BusFrame::Log { .. }
    ));
}

#[test]
fn frames_are_ordered_within_a_topic() {
    let bus = LogBus::default();
    let (execution_id, job_id, step_id) = ids();
    let mut subscriber = bus.subscribe(&execution_topic(execution_id));

    for line in 0..5 {
        bus.publish_log(
            execution_id,
            job_id,
            step_id,
            format!("line {line}"),
            LogLevel::Info,
            ts(line),
        );
    }

    for line in 0..5 {
        match subscriber.try_recv().unwrap() {
            BusFrame::Log { content, .. } => assert_eq!(content, format!("line {line}")),
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[test]
fn status_updates_use_the_same_fan_out() {
    let bus = LogBus::default();
    let (execution_id, job_id, _step_id) = ids();
    let mut by_job = bus.subscribe(&job_topic(job_id));
    let mut by_execution = bus.subscribe(&execution_topic(execution_id));

    bus.publish_status(
        execution_id,
        EntityKind::Job,
        job_id.get(),
        RunStatus::Running,
        ts(5),
    );

    for subscriber in [&mut by_job, &mut by_execution] {
        match subscriber.try_recv().unwrap() {
            BusFrame::StatusUpdate {
                entity_type,
                status,
                ..
            } => {
                assert_eq!(entity_type, EntityKind::Job);
                assert_eq!(status, RunStatus::Running);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

// ============================================================================
// SECTION: Best-Effort Delivery
// ============================================================================

#[test]
fn publishing_without_subscribers_is_a_no_op() {
    let bus = LogBus::default();
    let (execution_id, job_id, step_id) = ids();
    // No subscription exists; publishing must neither block nor fail.
    bus.publish_log(
        execution_id,
        job_id,
        step_id,
        "dropped".to_string(),
        LogLevel::Info,
        ts(1),
    );
}

#[test]
fn slow_subscribers_drop_frames_but_never_stall_publishers() {
    let bus = LogBus::new(4);
    let (execution_id, job_id, step_id) = ids();
    let mut slow = bus.subscribe(&execution_topic(execution_id));

    // Publish far past the channel capacity without consuming.
    for line in 0..64 {
        bus.publish_log(
            execution_id,
            job_id,
            step_id,
            format!("line {line}"),
            LogLevel::Info,
            ts(line),
        );
    }

    // The slow subscriber observes a lag error, then the most recent frames.
    assert!(matches!(slow.try_recv(), Err(TryRecvError::Lagged(_))));
    let mut delivered = 0;
    while let Ok(frame) = slow.try_recv() {
        assert!(matches!(frame, BusFrame::Log { .. }));
        delivered += 1;
    }
    assert!(delivered <= 4);
    assert!(delivered > 0);
}

#[test]
fn prune_drops_subscriberless_topics() {
    let bus = LogBus::default();
    let (execution_id, _job_id, _step_id) = ids();
    let subscriber = bus.subscribe(&execution_topic(execution_id));
    drop(subscriber);
    bus.prune();
    // Publishing after the prune recreates nothing and drops the frame.
    bus.publish(
        &execution_topic(execution_id),
        &BusFrame::HistoryComplete { count: 0 },
    );
}
