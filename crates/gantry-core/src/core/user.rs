// crates/gantry-core/src/core/user.rs
// ============================================================================
// Module: User and API Key Records
// Description: User identity and API-key entities for tenant resolution.
// Purpose: Carry the minimum identity surface the control plane needs.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Token issuance and the login surface are external collaborators; the
//! control plane only needs enough identity to resolve tenants, attribute
//! manual triggers, and check API-key scopes. Keys are stored as SHA-256
//! hashes with an 8-character display prefix; the raw key is shown once at
//! creation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ApiKeyId;
use crate::core::identifiers::TenantId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Users
// ============================================================================

/// Role of a user within a tenant.
///
/// # Invariants
/// - Variants are stable for serialization and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Tenant owner.
    Owner,
    /// Tenant administrator.
    Admin,
    /// Developer (default).
    #[default]
    Developer,
    /// Read-only viewer.
    Viewer,
}

impl UserRole {
    /// Returns true when the role administers the tenant.
    #[must_use]
    pub const fn is_tenant_admin(self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

/// User entity.
///
/// # Invariants
/// - `tenant_id` is `None` only for instance operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Owning tenant.
    pub tenant_id: Option<TenantId>,
    /// Login name.
    pub username: String,
    /// Role within the tenant.
    pub role: UserRole,
}

// ============================================================================
// SECTION: API Keys
// ============================================================================

/// API key entity for programmatic access.
///
/// # Invariants
/// - `key_hash` is the hex SHA-256 of the full raw key.
/// - `key_prefix` is the first 8 characters of the raw key, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Key identifier.
    pub id: ApiKeyId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning user.
    pub user_id: Option<UserId>,
    /// Human-readable key name.
    pub name: String,
    /// Hex SHA-256 hash of the raw key.
    pub key_hash: String,
    /// First 8 characters of the raw key.
    pub key_prefix: String,
    /// Granted scopes (e.g. `pipeline:read`, `execution:*`, `*`).
    pub scopes: Vec<String>,
    /// Whether the key is active.
    pub active: bool,
    /// Expiry time, when any.
    pub expires_at: Option<Timestamp>,
    /// Time of last use, when any.
    pub last_used_at: Option<Timestamp>,
    /// Creation time.
    pub created_at: Timestamp,
}

impl ApiKeyRecord {
    /// Returns true when the key is expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires| now > expires)
    }

    /// Returns true when the key is active and unexpired at `now`.
    #[must_use]
    pub fn is_valid(&self, now: Timestamp) -> bool {
        self.active && !self.is_expired(now)
    }

    /// Checks whether the key grants a scope.
    ///
    /// `*` grants everything; `<resource>:*` grants any action on the
    /// resource; otherwise the scope string must match exactly.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        if self.scopes.iter().any(|granted| granted == "*") {
            return true;
        }
        if self.scopes.iter().any(|granted| granted == scope) {
            return true;
        }
        let resource = scope.split(':').next().unwrap_or_default();
        let resource_wildcard = format!("{resource}:*");
        self.scopes.iter().any(|granted| granted == &resource_wildcard)
    }
}
