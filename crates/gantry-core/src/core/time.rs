// crates/gantry-core/src/core/time.rs
// ============================================================================
// Module: Gantry Time Model
// Description: Canonical timestamp representation for control-plane records.
// Purpose: Provide explicit, replayable time values across Gantry records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Gantry uses explicit time values embedded in records to keep the core
//! deterministic and testable. The core never reads wall-clock time directly;
//! hosts supply timestamps at every mutation boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp used in Gantry records, in unix epoch milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the timestamp shifted forward by the given number of seconds.
    #[must_use]
    pub const fn plus_seconds(self, seconds: i64) -> Self {
        Self(self.0.saturating_add(seconds.saturating_mul(1_000)))
    }

    /// Returns the timestamp shifted forward by the given number of days.
    #[must_use]
    pub const fn plus_days(self, days: i64) -> Self {
        self.plus_seconds(days.saturating_mul(86_400))
    }

    /// Returns the number of whole seconds elapsed from `earlier` to `self`.
    ///
    /// Negative when `self` precedes `earlier`.
    #[must_use]
    pub const fn seconds_since(self, earlier: Self) -> i64 {
        (self.0 - earlier.0) / 1_000
    }

    /// Returns the elapsed span from `earlier` to `self` in fractional seconds.
    #[must_use]
    pub fn span_seconds(self, earlier: Self) -> f64 {
        #[allow(
            clippy::cast_precision_loss,
            reason = "Durations far exceed f64 integer precision only after ~285k years."
        )]
        let millis = (self.0 - earlier.0) as f64;
        millis / 1_000.0
    }
}
