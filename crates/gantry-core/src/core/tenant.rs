// crates/gantry-core/src/core/tenant.rs
// ============================================================================
// Module: Tenant Records
// Description: Tenant entity with plan and resource quotas.
// Purpose: Root of multi-tenant isolation for every queryable entity.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A tenant is the root of isolation: every queryable entity below it carries
//! a tenant reference, and no cross-tenant read or write may occur. In SaaS
//! mode each organization is a tenant; in self-hosted mode a single default
//! tenant exists.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::TenantId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Plan
// ============================================================================

/// Commercial plan attached to a tenant.
///
/// # Invariants
/// - Variants are stable for serialization and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenantPlan {
    /// Free tier.
    #[default]
    Free,
    /// Professional tier.
    Pro,
    /// Enterprise tier.
    Enterprise,
    /// Self-hosted deployment (single tenant).
    SelfHosted,
}

impl TenantPlan {
    /// Returns a stable label for logs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
            Self::SelfHosted => "self_hosted",
        }
    }

    /// Parses a stable label back into a plan.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "free" => Some(Self::Free),
            "pro" => Some(Self::Pro),
            "enterprise" => Some(Self::Enterprise),
            "self_hosted" => Some(Self::SelfHosted),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Quotas
// ============================================================================

/// Resource quotas enforced per tenant.
///
/// # Invariants
/// - Limits are advisory ceilings checked at admission boundaries, not
///   continuously enforced invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantQuotas {
    /// Maximum registered runners.
    pub max_runners: u32,
    /// Maximum concurrently running jobs.
    pub max_concurrent_jobs: u32,
    /// Maximum artifact retention in days.
    pub retention_days: u32,
    /// Storage quota in megabytes.
    pub storage_mb: u64,
}

impl Default for TenantQuotas {
    fn default() -> Self {
        Self {
            max_runners: 3,
            max_concurrent_jobs: 5,
            retention_days: 30,
            storage_mb: 1_024,
        }
    }
}

// ============================================================================
// SECTION: Tenant Record
// ============================================================================

/// Tenant entity.
///
/// # Invariants
/// - `slug` is globally unique.
/// - Inactive tenants are excluded from resolution and scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant identifier.
    pub id: TenantId,
    /// Human-readable tenant name.
    pub name: String,
    /// URL-safe unique slug (also the SaaS subdomain).
    pub slug: String,
    /// Commercial plan.
    pub plan: TenantPlan,
    /// Resource quotas.
    pub quotas: TenantQuotas,
    /// Current storage usage in megabytes.
    pub current_storage_mb: u64,
    /// Whether the tenant is active.
    pub active: bool,
    /// Creation time.
    pub created_at: Timestamp,
}

impl Tenant {
    /// Returns true when the tenant may register one more runner.
    #[must_use]
    pub fn within_runner_quota(&self, registered_runners: u32) -> bool {
        registered_runners < self.quotas.max_runners
    }

    /// Returns true when the tenant has storage headroom.
    #[must_use]
    pub const fn within_storage_quota(&self) -> bool {
        self.current_storage_mb < self.quotas.storage_mb
    }
}
