// crates/gantry-server/src/config.rs
// ============================================================================
// Module: Server Configuration
// Description: Environment-derived configuration with accumulated validation.
// Purpose: One validated configuration record for the whole server process.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Configuration comes from environment variables and is validated in one
//! pass: every problem is accumulated and reported together rather than
//! failing on the first. Defaults favor self-hosted development; SaaS
//! deployments must provide the master encryption key explicitly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// SECTION: Environment Variables
// ============================================================================

/// Deployment mode variable (`saas` or `self_hosted`).
pub const ENV_DEPLOYMENT_MODE: &str = "GANTRY_DEPLOYMENT_MODE";
/// Bind address variable.
pub const ENV_BIND_ADDR: &str = "GANTRY_BIND_ADDR";
/// Database path variable (empty selects the in-memory store).
pub const ENV_DB_PATH: &str = "GANTRY_DB_PATH";
/// Default tenant slug variable (self-hosted mode).
pub const ENV_DEFAULT_TENANT_SLUG: &str = "GANTRY_DEFAULT_TENANT_SLUG";
/// Master secret-encryption key variable.
pub const ENV_SECRET_ENCRYPTION_KEY: &str = "SECRET_ENCRYPTION_KEY";
/// Fallback webhook secret variable.
pub const ENV_GITHUB_WEBHOOK_SECRET: &str = "GITHUB_WEBHOOK_SECRET";
/// Runner heartbeat interval variable (seconds).
pub const ENV_RUNNER_HEARTBEAT_INTERVAL: &str = "RUNNER_HEARTBEAT_INTERVAL";
/// Runner offline threshold variable (seconds).
pub const ENV_RUNNER_OFFLINE_THRESHOLD: &str = "RUNNER_OFFLINE_THRESHOLD";
/// Artifact storage backend variable (`local` or `s3`).
pub const ENV_ARTIFACT_STORAGE_BACKEND: &str = "ARTIFACT_STORAGE_BACKEND";
/// Artifact storage path variable (local backend).
pub const ENV_ARTIFACT_STORAGE_PATH: &str = "ARTIFACT_STORAGE_PATH";
/// Log backlog limit variable.
pub const ENV_LOG_BACKLOG_LIMIT: &str = "GANTRY_LOG_BACKLOG_LIMIT";

// ============================================================================
// SECTION: Config Records
// ============================================================================

/// Deployment mode.
///
/// # Invariants
/// - Values map 1:1 to the `saas`/`self_hosted` variable values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeploymentMode {
    /// Multi-tenant SaaS deployment.
    #[default]
    Saas,
    /// Single-tenant self-hosted deployment.
    SelfHosted,
}

/// Artifact storage backend selector.
///
/// # Invariants
/// - The backend itself is an external collaborator; the control plane only
///   records paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactBackend {
    /// Local filesystem paths.
    #[default]
    Local,
    /// S3-style object storage paths.
    S3,
}

/// Validated server configuration.
///
/// # Invariants
/// - `heartbeat_interval_secs < offline_threshold_secs`.
/// - `log_backlog_limit >= 1`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Deployment mode.
    pub deployment_mode: DeploymentMode,
    /// HTTP bind address.
    pub bind_addr: SocketAddr,
    /// Database file path; `None` selects the in-memory store.
    pub db_path: Option<PathBuf>,
    /// Default tenant slug for self-hosted mode.
    pub default_tenant_slug: String,
    /// Master key for per-tenant secret encryption.
    pub secret_encryption_key: String,
    /// Fallback webhook secret for pipelines without one.
    pub github_webhook_secret: String,
    /// Expected runner heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Silence threshold after which a runner is marked offline, in seconds.
    pub offline_threshold_secs: u64,
    /// Artifact storage backend.
    pub artifact_backend: ArtifactBackend,
    /// Base path for the local artifact backend.
    pub artifact_storage_path: PathBuf,
    /// Maximum historical chunks delivered to a new log subscriber.
    pub log_backlog_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            deployment_mode: DeploymentMode::SelfHosted,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8420)),
            db_path: None,
            default_tenant_slug: "default".to_string(),
            secret_encryption_key: String::new(),
            github_webhook_secret: String::new(),
            heartbeat_interval_secs: 30,
            offline_threshold_secs: 90,
            artifact_backend: ArtifactBackend::Local,
            artifact_storage_path: PathBuf::from("artifacts"),
            log_backlog_limit: 1_000,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration validation failure with every accumulated problem.
///
/// # Invariants
/// - `problems` is non-empty.
#[derive(Debug, Error)]
#[error("invalid server configuration: {}", problems.join("; "))]
pub struct ConfigError {
    /// Accumulated validation problems.
    pub problems: Vec<String>,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl ServerConfig {
    /// Loads configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] with every accumulated problem.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Loads configuration from an explicit variable map (testable form).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] with every accumulated problem.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut problems = Vec::new();
        let mut config = Self::default();

        match vars.get(ENV_DEPLOYMENT_MODE).map(String::as_str) {
            None | Some("") => {}
            Some("saas") => config.deployment_mode = DeploymentMode::Saas,
            Some("self_hosted") => config.deployment_mode = DeploymentMode::SelfHosted,
            Some(other) => problems.push(format!(
                "{ENV_DEPLOYMENT_MODE} must be 'saas' or 'self_hosted', got '{other}'"
            )),
        }

        if let Some(addr) = vars.get(ENV_BIND_ADDR).filter(|addr| !addr.is_empty()) {
            match addr.parse() {
                Ok(addr) => config.bind_addr = addr,
                Err(_) => problems.push(format!("{ENV_BIND_ADDR} is not a socket address: {addr}")),
            }
        }

        if let Some(path) = vars.get(ENV_DB_PATH).filter(|path| !path.is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(slug) = vars
            .get(ENV_DEFAULT_TENANT_SLUG)
            .filter(|slug| !slug.is_empty())
        {
            config.default_tenant_slug = slug.clone();
        }
        if let Some(key) = vars.get(ENV_SECRET_ENCRYPTION_KEY) {
            config.secret_encryption_key = key.clone();
        }
        if let Some(secret) = vars.get(ENV_GITHUB_WEBHOOK_SECRET) {
            config.github_webhook_secret = secret.clone();
        }

        if let Some(value) = parse_seconds(vars, ENV_RUNNER_HEARTBEAT_INTERVAL, &mut problems) {
            config.heartbeat_interval_secs = value;
        }
        if let Some(value) = parse_seconds(vars, ENV_RUNNER_OFFLINE_THRESHOLD, &mut problems) {
            config.offline_threshold_secs = value;
        }

        match vars.get(ENV_ARTIFACT_STORAGE_BACKEND).map(String::as_str) {
            None | Some("") => {}
            Some("local") => config.artifact_backend = ArtifactBackend::Local,
            Some("s3") => config.artifact_backend = ArtifactBackend::S3,
            Some(other) => problems.push(format!(
                "{ENV_ARTIFACT_STORAGE_BACKEND} must be 'local' or 's3', got '{other}'"
            )),
        }
        if let Some(path) = vars
            .get(ENV_ARTIFACT_STORAGE_PATH)
            .filter(|path| !path.is_empty())
        {
            config.artifact_storage_path = PathBuf::from(path);
        }
        if let Some(limit) = vars.get(ENV_LOG_BACKLOG_LIMIT).filter(|limit| !limit.is_empty()) {
            match limit.parse::<usize>() {
                Ok(limit) if limit >= 1 => config.log_backlog_limit = limit,
                _ => problems.push(format!(
                    "{ENV_LOG_BACKLOG_LIMIT} must be a positive integer, got '{limit}'"
                )),
            }
        }

        if config.heartbeat_interval_secs >= config.offline_threshold_secs {
            problems.push(format!(
                "{ENV_RUNNER_HEARTBEAT_INTERVAL} ({}) must be below {ENV_RUNNER_OFFLINE_THRESHOLD} ({})",
                config.heartbeat_interval_secs, config.offline_threshold_secs
            ));
        }
        if config.deployment_mode == DeploymentMode::Saas
            && config.secret_encryption_key.is_empty()
        {
            problems.push(format!(
                "{ENV_SECRET_ENCRYPTION_KEY} is required in saas mode"
            ));
        }

        if problems.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError { problems })
        }
    }
}

/// Parses a positive seconds variable, accumulating problems.
fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    problems: &mut Vec<String>,
) -> Option<u64> {
    let raw = vars.get(name).filter(|raw| !raw.is_empty())?;
    match raw.parse::<u64>() {
        Ok(value) if value >= 1 => Some(value),
        _ => {
            problems.push(format!("{name} must be a positive integer, got '{raw}'"));
            None
        }
    }
}
