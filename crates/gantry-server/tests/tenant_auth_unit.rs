// crates/gantry-server/tests/tenant_auth_unit.rs
// ============================================================================
// Module: Tenant Resolution and Auth Unit Tests
// Description: Resolution chain order, token formats, and scope grammar.
// Purpose: Validate the isolation boundary at the request edge.
// ============================================================================

//! Tenant resolution and token authentication tests.

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

use std::collections::HashMap;
use std::sync::Arc;

use gantry_core::ControlPlaneStore;
use gantry_core::InMemoryStore;
use gantry_core::NewApiKey;
use gantry_core::NewTenant;
use gantry_core::Tenant;
use gantry_core::TenantPlan;
use gantry_core::TenantQuotas;
use gantry_core::Timestamp;
use gantry_core::User;
use gantry_core::UserId;
use gantry_core::UserRole;
use gantry_server::Config;
use gantry_server::DeploymentMode;
use gantry_server::auth::API_KEY_PREFIX;
use gantry_server::auth::AuthContext;
use gantry_server::auth::RUNNER_TOKEN_PREFIX;
use gantry_server::auth::generate_api_key;
use gantry_server::auth::generate_runner_token;
use gantry_server::auth::token_matches;
use gantry_server::config::ENV_DEPLOYMENT_MODE;
use gantry_server::config::ENV_RUNNER_HEARTBEAT_INTERVAL;
use gantry_server::config::ENV_RUNNER_OFFLINE_THRESHOLD;
use gantry_server::config::ENV_SECRET_ENCRYPTION_KEY;
use gantry_server::config::ServerConfig;
use gantry_server::tenant::TenantSource;
use gantry_server::tenant::resolve_tenant;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn now() -> Timestamp {
    Timestamp::from_unix_millis(1_000)
}

fn store_with_tenants() -> (Arc<InMemoryStore>, Tenant, Tenant) {
    let store = Arc::new(InMemoryStore::new());
    let acme = store
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
    let fallback = store
        .create_tenant(
            NewTenant {
                name: "Default".to_string(),
                slug: "default".to_string(),
                plan: TenantPlan::SelfHosted,
                quotas: TenantQuotas::default(),
            },
            now(),
        )
        .unwrap();
    (store, acme, fallback)
}

// ============================================================================
// SECTION: Token Formats
// ============================================================================

#[test]
fn generated_tokens_carry_the_documented_prefixes() {
    let api_key = generate_api_key();
    assert!(api_key.raw.starts_with(API_KEY_PREFIX));
    assert_eq!(api_key.prefix.len(), 8);
    assert!(api_key.raw.starts_with(&api_key.prefix));
    assert_eq!(api_key.hash.len(), 64);

    let runner_token = generate_runner_token();
    assert!(runner_token.raw.starts_with(RUNNER_TOKEN_PREFIX));
    assert_ne!(api_key.raw, runner_token.raw);
}

#[test]
fn token_matches_is_exact() {
    let token = generate_runner_token();
    assert!(token_matches(&token.raw, &token.hash));
    assert!(!token_matches("mci_runner_wrong", &token.hash));
    assert!(!token_matches(&token.raw, "deadbeef"));
}

// ============================================================================
// SECTION: Scope Grammar
// ============================================================================

#[test]
fn scope_wildcards_grant_by_resource() {
    let (store, acme, _fallback) = store_with_tenants();
    let key = store
        .create_api_key(
            NewApiKey {
                tenant_id: acme.id,
                user_id: None,
                name: "ci".to_string(),
                key_hash: "aa".repeat(32),
                key_prefix: "mci_aaaa".to_string(),
                scopes: vec!["pipeline:*".to_string(), "execution:read".to_string()],
                expires_at: None,
            },
            now(),
        )
        .unwrap();

    assert!(key.has_scope("pipeline:read"));
    assert!(key.has_scope("pipeline:write"));
    assert!(key.has_scope("execution:read"));
    assert!(!key.has_scope("execution:write"));
    assert!(!key.has_scope("secret:read"));
}

#[test]
fn star_scope_grants_everything() {
    let (store, acme, _fallback) = store_with_tenants();
    let key = store
        .create_api_key(
            NewApiKey {
                tenant_id: acme.id,
                user_id: None,
                name: "admin".to_string(),
                key_hash: "bb".repeat(32),
                key_prefix: "mci_bbbb".to_string(),
                scopes: vec!["*".to_string()],
                expires_at: None,
            },
            now(),
        )
        .unwrap();
    assert!(key.has_scope("anything:at_all"));
}

// ============================================================================
// SECTION: Resolution Chain
// ============================================================================

#[test]
fn authenticated_user_tenant_wins() {
    let (store, acme, _fallback) = store_with_tenants();
    let config = ServerConfig::default();
    let auth = AuthContext {
        user: Some(User {
            id: UserId::from_raw(1).unwrap(),
            tenant_id: Some(acme.id),
            username: "dana".to_string(),
            role: UserRole::Developer,
        }),
        api_key: None,
    };

    let context = resolve_tenant(store.as_ref(), &config, &auth, None, None, now())
        .unwrap()
        .unwrap();
    assert_eq!(context.tenant.id, acme.id);
    assert_eq!(context.source, TenantSource::User);
}

#[test]
fn api_key_resolves_when_no_user() {
    let (store, acme, _fallback) = store_with_tenants();
    let generated = generate_api_key();
    store
        .create_api_key(
            NewApiKey {
                tenant_id: acme.id,
                user_id: None,
                name: "ci".to_string(),
                key_hash: generated.hash.clone(),
                key_prefix: generated.prefix.clone(),
                scopes: vec!["*".to_string()],
                expires_at: None,
            },
            now(),
        )
        .unwrap();

    let config = ServerConfig::default();
    let context = resolve_tenant(
        store.as_ref(),
        &config,
        &AuthContext::default(),
        Some(&generated.raw),
        None,
        now(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(context.tenant.id, acme.id);
    assert_eq!(context.source, TenantSource::ApiKey);

    // Usage is recorded.
    let key = store.api_key_by_hash(&generated.hash).unwrap().unwrap();
    assert_eq!(key.last_used_at, Some(now()));
}

#[test]
fn expired_api_key_does_not_resolve() {
    let (store, acme, fallback) = store_with_tenants();
    let generated = generate_api_key();
    store
        .create_api_key(
            NewApiKey {
                tenant_id: acme.id,
                user_id: None,
                name: "old".to_string(),
                key_hash: generated.hash,
                key_prefix: generated.prefix,
                scopes: vec!["*".to_string()],
                expires_at: Some(Timestamp::from_unix_millis(500)),
            },
            now(),
        )
        .unwrap();

    let config = ServerConfig::default();
    let context = resolve_tenant(
        store.as_ref(),
        &config,
        &AuthContext::default(),
        Some("mci_expired"),
        None,
        now(),
    )
    .unwrap();
    // Self-hosted default still resolves, but never via the key.
    let context = context.unwrap();
    assert_eq!(context.tenant.id, fallback.id);
    assert_eq!(context.source, TenantSource::DefaultTenant);
}

#[test]
fn subdomain_resolves_skipping_reserved_names() {
    let (store, acme, _fallback) = store_with_tenants();
    let config = ServerConfig {
        deployment_mode: DeploymentMode::Saas,
        ..ServerConfig::default()
    };

    let context = resolve_tenant(
        store.as_ref(),
        &config,
        &AuthContext::default(),
        None,
        Some("acme.gantry.dev:443"),
        now(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(context.tenant.id, acme.id);
    assert_eq!(context.source, TenantSource::Subdomain);

    // Reserved subdomains never resolve; saas mode has no default tenant.
    for host in ["www.gantry.dev", "api.gantry.dev", "app.gantry.dev", "admin.gantry.dev"] {
        let unresolved = resolve_tenant(
            store.as_ref(),
            &config,
            &AuthContext::default(),
            None,
            Some(host),
            now(),
        )
        .unwrap();
        assert!(unresolved.is_none(), "{host} resolved unexpectedly");
    }
}

#[test]
fn self_hosted_mode_falls_back_to_default_tenant() {
    let (store, _acme, fallback) = store_with_tenants();
    let config = ServerConfig::default();

    let context = resolve_tenant(
        store.as_ref(),
        &config,
        &AuthContext::default(),
        None,
        Some("localhost:8420"),
        now(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(context.tenant.id, fallback.id);
    assert_eq!(context.source, TenantSource::DefaultTenant);
}

// ============================================================================
// SECTION: Config Validation
// ============================================================================

#[test]
fn config_accumulates_every_problem() {
    let mut vars = HashMap::new();
    vars.insert(ENV_DEPLOYMENT_MODE.to_string(), "cloud".to_string());
    vars.insert(ENV_RUNNER_HEARTBEAT_INTERVAL.to_string(), "zero".to_string());
    vars.insert(ENV_RUNNER_OFFLINE_THRESHOLD.to_string(), "10".to_string());

    let problems = Config::from_vars(&vars).unwrap_err().problems;
    assert!(problems.iter().any(|problem| problem.contains("cloud")));
    assert!(problems.iter().any(|problem| problem.contains("zero")));
    assert!(
        problems
            .iter()
            .any(|problem| problem.contains("must be below"))
    );
}

#[test]
fn saas_mode_requires_the_master_key() {
    let mut vars = HashMap::new();
    vars.insert(ENV_DEPLOYMENT_MODE.to_string(), "saas".to_string());
    let problems = Config::from_vars(&vars).unwrap_err().problems;
    assert!(
        problems
            .iter()
            .any(|problem| problem.contains(ENV_SECRET_ENCRYPTION_KEY))
    );

    vars.insert(ENV_SECRET_ENCRYPTION_KEY.to_string(), "master".to_string());
    let config = Config::from_vars(&vars).unwrap();
    assert_eq!(config.deployment_mode, DeploymentMode::Saas);
    assert_eq!(config.heartbeat_interval_secs, 30);
    assert_eq!(config.offline_threshold_secs, 90);
    assert_eq!(config.log_backlog_limit, 1_000);
}
