// crates/gantry-core/src/core/identifiers.rs
// ============================================================================
// Module: Gantry Identifiers
// Description: Canonical opaque identifiers for control-plane entities.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout the Gantry
//! control plane. Identifiers are opaque and serialize as numbers or strings
//! on the wire. Numeric identifiers enforce non-zero, 1-based invariants at
//! construction boundaries; the store allocates them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Numeric Identifier Types
// ============================================================================

/// Declares a non-zero numeric identifier newtype with the shared invariants.
macro_rules! numeric_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        ///
        /// # Invariants
        /// - Always >= 1 (non-zero, 1-based).
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Creates a new identifier from a non-zero value.
            #[must_use]
            pub const fn new(id: NonZeroU64) -> Self {
                Self(id)
            }

            /// Creates an identifier from a raw value (returns `None` if zero).
            #[must_use]
            pub fn from_raw(raw: u64) -> Option<Self> {
                NonZeroU64::new(raw).map(Self)
            }

            /// Returns the raw identifier value (always >= 1).
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.get().fmt(f)
            }
        }
    };
}

numeric_id!(
    /// Tenant identifier, the root of multi-tenant isolation.
    TenantId
);

numeric_id!(
    /// Pipeline identifier scoped within a tenant.
    PipelineId
);

numeric_id!(
    /// Versioned pipeline configuration identifier.
    ConfigId
);

numeric_id!(
    /// Execution identifier for a single pipeline run.
    ExecutionId
);

numeric_id!(
    /// Job identifier for one vertex of an execution DAG.
    JobId
);

numeric_id!(
    /// Step identifier for one sequential unit within a job.
    StepId
);

numeric_id!(
    /// Runner identifier for an external worker process.
    RunnerId
);

numeric_id!(
    /// Secret identifier scoped within a tenant.
    SecretId
);

numeric_id!(
    /// Artifact identifier tied to an execution and job.
    ArtifactId
);

numeric_id!(
    /// User identifier for manual and API triggers.
    UserId
);

numeric_id!(
    /// API key identifier for programmatic access.
    ApiKeyId
);

// ============================================================================
// SECTION: String Identifier Types
// ============================================================================

/// Job key as declared in the workflow YAML (e.g. `build`, `test`).
///
/// # Invariants
/// - Opaque UTF-8 string; format validation happens in the config validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(String);

impl JobKey {
    /// Creates a new job key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Webhook delivery identifier assigned by the source-control vendor.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryId(String);

impl DeliveryId {
    /// Creates a new delivery identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Concurrency group key scoping mutual exclusion across executions.
///
/// # Invariants
/// - Opaque UTF-8 string; an empty group means "no concurrency control".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConcurrencyGroup(String);

impl ConcurrencyGroup {
    /// Creates a new concurrency group key.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self(group.into())
    }

    /// Returns the group as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the group is empty (no concurrency control).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ConcurrencyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
