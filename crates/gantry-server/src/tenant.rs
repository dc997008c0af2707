// crates/gantry-server/src/tenant.rs
// ============================================================================
// Module: Tenant Resolution
// Description: Request-scoped tenant identification chain.
// Purpose: Thread an explicit tenant context through handlers and queries.
// Dependencies: gantry-core, crate::{auth, config}
// ============================================================================

//! ## Overview
//! The tenant is resolved per request, first match wins: the authenticated
//! user's tenant, the API key's tenant (`X-API-Key`, hashed SHA-256), the
//! subdomain (skipping `www`, `api`, `app`, `admin`), and finally the fixed
//! default tenant in self-hosted mode. The resolved context is passed
//! explicitly down to storage queries; there is no ambient per-thread
//! state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use gantry_core::ControlPlaneStore;
use gantry_core::StoreError;
use gantry_core::Tenant;
use gantry_core::Timestamp;

use crate::auth::AuthContext;
use crate::auth::hash_token;
use crate::config::DeploymentMode;
use crate::config::ServerConfig;

// ============================================================================
// SECTION: Resolution Context
// ============================================================================

/// Header carrying an API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Subdomains never treated as tenant slugs.
const RESERVED_SUBDOMAINS: [&str; 4] = ["www", "api", "app", "admin"];

/// How the tenant was resolved, for audit labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantSource {
    /// Authenticated user's tenant.
    User,
    /// API key's tenant.
    ApiKey,
    /// SaaS subdomain.
    Subdomain,
    /// Self-hosted default tenant.
    DefaultTenant,
}

/// Resolved tenant context for one request.
///
/// # Invariants
/// - `tenant.active` is always true for resolved contexts.
#[derive(Debug, Clone)]
pub struct TenantContext {
    /// Resolved tenant.
    pub tenant: Tenant,
    /// Resolution source.
    pub source: TenantSource,
}

// ============================================================================
// SECTION: Resolution Chain
// ============================================================================

/// Resolves the tenant for a request. First non-empty source wins.
///
/// # Errors
///
/// Returns [`StoreError`] when a lookup fails; an unresolved tenant is
/// `Ok(None)`, which callers map to an authorization failure.
pub fn resolve_tenant(
    store: &dyn ControlPlaneStore,
    config: &ServerConfig,
    auth: &AuthContext,
    api_key_header: Option<&str>,
    host: Option<&str>,
    now: Timestamp,
) -> Result<Option<TenantContext>, StoreError> {
    // 1. Authenticated user's tenant.
    if let Some(user) = &auth.user
        && let Some(tenant_id) = user.tenant_id
        && let Some(tenant) = store.tenant(tenant_id)?
        && tenant.active
    {
        return Ok(Some(TenantContext {
            tenant,
            source: TenantSource::User,
        }));
    }

    // 2. API key, hashed and looked up; usage is recorded on success.
    if let Some(raw_key) = api_key_header.filter(|key| !key.is_empty())
        && let Some(key) = store.api_key_by_hash(&hash_token(raw_key))?
        && key.is_valid(now)
        && let Some(tenant) = store.tenant(key.tenant_id)?
        && tenant.active
    {
        store.record_api_key_use(key.id, now)?;
        return Ok(Some(TenantContext {
            tenant,
            source: TenantSource::ApiKey,
        }));
    }

    // 3. Subdomain, skipping reserved names.
    if let Some(host) = host
        && let Some(slug) = subdomain_of(host)
        && let Some(tenant) = store.tenant_by_slug(slug)?
    {
        return Ok(Some(TenantContext {
            tenant,
            source: TenantSource::Subdomain,
        }));
    }

    // 4. Self-hosted deployments fall back to the fixed default tenant.
    if config.deployment_mode == DeploymentMode::SelfHosted
        && let Some(tenant) = store.tenant_by_slug(&config.default_tenant_slug)?
    {
        return Ok(Some(TenantContext {
            tenant,
            source: TenantSource::DefaultTenant,
        }));
    }

    Ok(None)
}

/// Extracts a candidate tenant slug from the request host.
fn subdomain_of(host: &str) -> Option<&str> {
    let without_port = host.split(':').next().unwrap_or(host);
    let mut parts = without_port.split('.');
    let candidate = parts.next()?;
    // A bare host ("localhost") has no subdomain.
    if parts.next().is_none() {
        return None;
    }
    if RESERVED_SUBDOMAINS.contains(&candidate) || candidate.is_empty() {
        return None;
    }
    Some(candidate)
}
