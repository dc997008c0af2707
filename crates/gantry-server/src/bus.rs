// crates/gantry-server/src/bus.rs
// ============================================================================
// Module: Log Fan-Out Bus
// Description: Topic-keyed broadcast of log chunks and status updates.
// Purpose: Deliver live frames to subscribers without ever stalling publishers.
// Dependencies: gantry-core, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! Two topic families exist: `logs_job_{job_id}` and
//! `logs_execution_{execution_id}`. Publishing is fire-and-forget over
//! bounded broadcast channels: a slow subscriber drops frames but never
//! blocks a publisher, and frames within one topic are delivered in the
//! order the bus accepted them. No ordering is promised across topics.
//! Backlog delivery and the `history_complete` marker are the subscriber
//! handler's job; the bus only carries live frames.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use gantry_core::ExecutionId;
use gantry_core::JobId;
use gantry_core::LogLevel;
use gantry_core::RunStatus;
use gantry_core::StepId;
use gantry_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::broadcast;

// ============================================================================
// SECTION: Topics
// ============================================================================

/// Default per-topic channel capacity.
const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// Returns the topic carrying one job's frames.
#[must_use]
pub fn job_topic(job_id: JobId) -> String {
    format!("logs_job_{job_id}")
}

/// Returns the topic carrying one execution's frames.
#[must_use]
pub fn execution_topic(execution_id: ExecutionId) -> String {
    format!("logs_execution_{execution_id}")
}

// ============================================================================
// SECTION: Frames
// ============================================================================

/// Entity kinds referenced by status-update frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Job entity.
    Job,
    /// Step entity.
    Step,
    /// Execution entity.
    Execution,
}

/// One frame delivered to log subscribers.
///
/// # Invariants
/// - Frames serialize with a `type` tag matching the wire protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusFrame {
    /// One log chunk.
    Log {
        /// Job the chunk belongs to.
        job_id: JobId,
        /// Step the chunk belongs to.
        step_id: StepId,
        /// Chunk text.
        content: String,
        /// Severity level.
        level: LogLevel,
        /// Runner-reported timestamp.
        timestamp: Timestamp,
    },
    /// One entity status change.
    StatusUpdate {
        /// Entity kind.
        entity_type: EntityKind,
        /// Entity identifier.
        entity_id: u64,
        /// New status.
        status: RunStatus,
        /// Server timestamp of the change.
        timestamp: Timestamp,
    },
    /// Marker separating backlog from live frames.
    HistoryComplete {
        /// Number of backlog frames delivered.
        count: usize,
    },
}

// ============================================================================
// SECTION: Bus
// ============================================================================

/// Topic-keyed broadcast bus.
///
/// # Invariants
/// - Publishing never blocks; frames to topics without subscribers are
///   dropped.
#[derive(Debug)]
pub struct LogBus {
    /// Live channels by topic.
    topics: Mutex<HashMap<String, broadcast::Sender<BusFrame>>>,
    /// Channel capacity applied to new topics.
    capacity: usize,
}

impl Default for LogBus {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

impl LogBus {
    /// Creates a bus with the given per-topic capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Locks the topic table, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<BusFrame>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes to a topic, creating it on first use.
    #[must_use]
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<BusFrame> {
        let mut topics = self.lock();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publishes a frame to a topic. Fire-and-forget.
    pub fn publish(&self, topic: &str, frame: &BusFrame) {
        let sender = {
            let topics = self.lock();
            topics.get(topic).cloned()
        };
        if let Some(sender) = sender {
            // A send error only means no live subscribers remain.
            let _ = sender.send(frame.clone());
        }
    }

    /// Publishes a log frame to both its job and execution topics.
    pub fn publish_log(
        &self,
        execution_id: ExecutionId,
        job_id: JobId,
        step_id: StepId,
        content: String,
        level: LogLevel,
        timestamp: Timestamp,
    ) {
        let frame = BusFrame::Log {
            job_id,
            step_id,
            content,
            level,
            timestamp,
        };
        self.publish(&job_topic(job_id), &frame);
        self.publish(&execution_topic(execution_id), &frame);
    }

    /// Publishes a status update to an execution topic (and the job topic
    /// when the entity is a job).
    pub fn publish_status(
        &self,
        execution_id: ExecutionId,
        entity_type: EntityKind,
        entity_id: u64,
        status: RunStatus,
        timestamp: Timestamp,
    ) {
        let frame = BusFrame::StatusUpdate {
            entity_type,
            entity_id,
            status,
            timestamp,
        };
        if entity_type == EntityKind::Job
            && let Some(job_id) = JobId::from_raw(entity_id)
        {
            self.publish(&job_topic(job_id), &frame);
        }
        self.publish(&execution_topic(execution_id), &frame);
    }

    /// Drops topics with no remaining subscribers.
    pub fn prune(&self) {
        self.lock().retain(|_, sender| sender.receiver_count() > 0);
    }
}
