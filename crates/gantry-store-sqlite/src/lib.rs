// crates/gantry-store-sqlite/src/lib.rs
// ============================================================================
// Module: Gantry SQLite Store
// Description: Durable ControlPlaneStore backed by SQLite WAL.
// Purpose: Persist control-plane state with transactional plan commits.
// Dependencies: gantry-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The SQLite store is the durable implementation of the control-plane
//! storage contract. Unique constraints are the correctness floor for the
//! races the model calls out: `(pipeline, number)` for execution numbering,
//! `(step, chunk_number)` for log allocation, and a compare-and-set update
//! for at-most-once dispatch claims. Plan commits are single transactions
//! that also enqueue the execution-ready work item (outbox pattern).

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Store implementation.
pub mod store;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use crate::store::SqliteJournalMode;
pub use crate::store::SqliteStore;
pub use crate::store::SqliteStoreConfig;
pub use crate::store::SqliteStoreError;
