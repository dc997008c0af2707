// crates/gantry-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Control-Plane Store
// Description: Durable ControlPlaneStore over rusqlite with WAL pragmas.
// Purpose: Persist tenants, pipelines, executions, runners, and logs.
// Dependencies: gantry-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! One connection behind a mutex serves both reads and writes; every trait
//! method is one transaction. Correctness-critical races rest on storage
//! constraints: `(pipeline_id, number)` uniqueness floors execution
//! numbering, `(step_id, chunk_number)` floors log allocation, and dispatch
//! claims are a compare-and-set update on `status = 'queued'`. Foreign keys
//! encode the ownership model: strict containment cascades, weak references
//! null out.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use gantry_core::Artifact;
use gantry_core::ConcurrencyGroup;
use gantry_core::ControlPlaneStore;
use gantry_core::Execution;
use gantry_core::ExecutionId;
use gantry_core::Job;
use gantry_core::JobId;
use gantry_core::JobKey;
use gantry_core::LogChunk;
use gantry_core::LogLevel;
use gantry_core::LogRecord;
use gantry_core::NewApiKey;
use gantry_core::NewArtifact;
use gantry_core::NewConfig;
use gantry_core::NewPipeline;
use gantry_core::NewRunner;
use gantry_core::NewSecret;
use gantry_core::NewTenant;
use gantry_core::Pipeline;
use gantry_core::PipelineConfigRecord;
use gantry_core::PipelineId;
use gantry_core::PlannedExecution;
use gantry_core::Runner;
use gantry_core::RunnerId;
use gantry_core::RunnerStatus;
use gantry_core::RunnerType;
use gantry_core::RunStatus;
use gantry_core::Secret;
use gantry_core::SecretId;
use gantry_core::SecretScope;
use gantry_core::StepId;
use gantry_core::StepType;
use gantry_core::StoreError;
use gantry_core::Tenant;
use gantry_core::TenantId;
use gantry_core::TenantPlan;
use gantry_core::TenantQuotas;
use gantry_core::Timestamp;
use gantry_core::TriggerType;
use gantry_core::ApiKeyId;
use gantry_core::ApiKeyRecord;
use gantry_core::ArtifactId;
use gantry_core::CancelledJob;
use gantry_core::ConfigId;
use gantry_core::Step;
use gantry_core::StepAction;
use gantry_core::UserId;
use gantry_core::planner::ExecutionPlan;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Store schema version.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// Configuration for the `SQLite` control-plane store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced while opening the store.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Underlying database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Store configuration is invalid.
    #[error("invalid store configuration: {0}")]
    Invalid(String),
}

/// Maps a database error onto the storage contract's error taxonomy.
fn map_sql_error(error: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, message) = &error
        && failure.code == ErrorCode::ConstraintViolation
    {
        return StoreError::Conflict(
            message
                .clone()
                .unwrap_or_else(|| "unique constraint violated".to_string()),
        );
    }
    StoreError::Store(error.to_string())
}

/// Serializes a value into a JSON column.
fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|error| StoreError::Invalid(error.to_string()))
}

/// Deserializes a JSON column.
fn from_json<T: serde::de::DeserializeOwned>(text: &str) -> rusqlite::Result<T> {
    serde_json::from_str(text).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(error),
        )
    })
}

/// Converts a label column via a parser, failing the row on junk.
fn parse_label<T>(label: &str, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(label).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::other(format!("unknown label: {label}"))),
        )
    })
}

/// Converts a stored rowid into a non-zero identifier value.
fn id_value(raw: i64) -> rusqlite::Result<std::num::NonZeroU64> {
    u64::try_from(raw)
        .ok()
        .and_then(std::num::NonZeroU64::new)
        .ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Integer,
                Box::new(std::io::Error::other("identifier out of range")),
            )
        })
}

/// Reads an optional timestamp column.
fn opt_ts(raw: Option<i64>) -> Option<Timestamp> {
    raw.map(Timestamp::from_unix_millis)
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable control-plane store backed by `SQLite`.
///
/// # Invariants
/// - One mutex guards the connection; each trait method is one transaction.
#[derive(Debug)]
pub struct SqliteStore {
    /// Guarded connection.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (and migrates) a store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the file cannot be opened or the
    /// schema cannot be applied.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        if config.path.as_os_str().is_empty() {
            return Err(SqliteStoreError::Invalid(
                "store path must not be empty".to_string(),
            ));
        }
        let conn = Connection::open(&config.path)?;
        Self::initialize(conn, config)
    }

    /// Opens an in-memory store (tests and ephemeral development).
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let config = SqliteStoreConfig {
            path: PathBuf::from(":memory:"),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::Delete,
        };
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, &config)
    }

    /// Applies pragmas and the schema to a fresh connection.
    fn initialize(conn: Connection, config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        conn.pragma_update(None, "journal_mode", config.journal_mode.pragma_value())?;
        conn.pragma_update(None, "foreign_keys", "on")?;
        conn.pragma_update(None, "busy_timeout", i64::try_from(config.busy_timeout_ms).unwrap_or(5_000))?;
        conn.execute_batch(SCHEMA_SQL)?;
        let existing: Option<i64> = conn
            .query_row("SELECT version FROM schema_meta LIMIT 1", [], |row| row.get(0))
            .optional()?;
        match existing {
            None => {
                conn.execute("INSERT INTO schema_meta (version) VALUES (?1)", [SCHEMA_VERSION])?;
            }
            Some(version) if version == SCHEMA_VERSION => {}
            Some(version) => {
                return Err(SqliteStoreError::Invalid(format!(
                    "unsupported schema version: {version} (expected {SCHEMA_VERSION})"
                )));
            }
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Locks the connection, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Schema DDL. Strict containment cascades; weak references null out.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_meta (
    version INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS tenants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    plan TEXT NOT NULL,
    max_runners INTEGER NOT NULL,
    max_concurrent_jobs INTEGER NOT NULL,
    retention_days INTEGER NOT NULL,
    storage_mb INTEGER NOT NULL,
    current_storage_mb INTEGER NOT NULL DEFAULT 0,
    active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS pipelines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    repo_url TEXT NOT NULL,
    default_branch TEXT NOT NULL,
    config_path TEXT NOT NULL,
    webhook_secret TEXT NOT NULL DEFAULT '',
    active INTEGER NOT NULL DEFAULT 1,
    last_execution_at INTEGER,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant_id, slug)
);
CREATE TABLE IF NOT EXISTS pipeline_configs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pipeline_id INTEGER NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
    version INTEGER NOT NULL,
    yaml_raw TEXT NOT NULL,
    parsed TEXT,
    commit_sha TEXT NOT NULL DEFAULT '',
    is_valid INTEGER NOT NULL,
    validation_errors TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (pipeline_id, version)
);
CREATE TABLE IF NOT EXISTS executions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    pipeline_id INTEGER NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
    config_id INTEGER REFERENCES pipeline_configs(id) ON DELETE SET NULL,
    number INTEGER NOT NULL,
    trigger_type TEXT NOT NULL,
    trigger_info TEXT NOT NULL,
    status TEXT NOT NULL,
    queued_at INTEGER,
    started_at INTEGER,
    finished_at INTEGER,
    environment TEXT NOT NULL,
    inputs TEXT NOT NULL,
    concurrency_group TEXT NOT NULL DEFAULT '',
    cancel_in_progress INTEGER NOT NULL DEFAULT 0,
    triggered_by INTEGER,
    created_at INTEGER NOT NULL,
    UNIQUE (pipeline_id, number)
);
CREATE TABLE IF NOT EXISTS runners (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER REFERENCES tenants(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    token_hash TEXT NOT NULL UNIQUE,
    runner_type TEXT NOT NULL,
    labels TEXT NOT NULL,
    capabilities TEXT NOT NULL,
    status TEXT NOT NULL,
    last_heartbeat INTEGER,
    system_info TEXT NOT NULL,
    max_concurrent_jobs INTEGER NOT NULL,
    current_jobs INTEGER NOT NULL DEFAULT 0,
    version TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    execution_id INTEGER NOT NULL REFERENCES executions(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    job_key TEXT NOT NULL,
    needs TEXT NOT NULL,
    condition TEXT NOT NULL DEFAULT '',
    matrix_values TEXT NOT NULL,
    runs_on TEXT NOT NULL,
    container TEXT,
    services TEXT NOT NULL,
    status TEXT NOT NULL,
    runner_id INTEGER REFERENCES runners(id) ON DELETE SET NULL,
    timeout_minutes INTEGER NOT NULL,
    outputs TEXT NOT NULL,
    environment TEXT NOT NULL,
    queued_at INTEGER,
    started_at INTEGER,
    finished_at INTEGER,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS steps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    ord INTEGER NOT NULL,
    step_type TEXT NOT NULL,
    run_command TEXT NOT NULL DEFAULT '',
    uses_action TEXT NOT NULL DEFAULT '',
    with_inputs TEXT NOT NULL,
    shell TEXT NOT NULL,
    working_directory TEXT NOT NULL DEFAULT '',
    env TEXT NOT NULL,
    condition TEXT NOT NULL DEFAULT '',
    continue_on_error INTEGER NOT NULL DEFAULT 0,
    timeout_minutes INTEGER NOT NULL,
    status TEXT NOT NULL,
    exit_code INTEGER,
    started_at INTEGER,
    finished_at INTEGER,
    outputs TEXT NOT NULL,
    UNIQUE (job_id, ord)
);
CREATE TABLE IF NOT EXISTS log_chunks (
    step_id INTEGER NOT NULL REFERENCES steps(id) ON DELETE CASCADE,
    chunk_number INTEGER NOT NULL,
    content TEXT NOT NULL,
    level TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    PRIMARY KEY (step_id, chunk_number)
);
CREATE TABLE IF NOT EXISTS secrets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    pipeline_id INTEGER REFERENCES pipelines(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    ciphertext TEXT NOT NULL,
    scope TEXT NOT NULL,
    last_updated_by INTEGER,
    created_at INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_secrets_pipeline_name
    ON secrets(tenant_id, pipeline_id, name) WHERE pipeline_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS idx_secrets_org_name
    ON secrets(tenant_id, name) WHERE pipeline_id IS NULL;
CREATE TABLE IF NOT EXISTS artifacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    execution_id INTEGER NOT NULL REFERENCES executions(id) ON DELETE CASCADE,
    job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    storage_path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    checksum_sha256 TEXT NOT NULL,
    file_count INTEGER NOT NULL DEFAULT 1,
    compression TEXT NOT NULL DEFAULT '',
    retention_days INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS api_keys (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    user_id INTEGER,
    name TEXT NOT NULL,
    key_hash TEXT NOT NULL UNIQUE,
    key_prefix TEXT NOT NULL,
    scopes TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    expires_at INTEGER,
    last_used_at INTEGER,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS work_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    execution_id INTEGER NOT NULL,
    enqueued_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_executions_pipeline ON executions(pipeline_id, number);
CREATE INDEX IF NOT EXISTS idx_executions_group
    ON executions(pipeline_id, concurrency_group, status);
CREATE INDEX IF NOT EXISTS idx_jobs_execution ON jobs(execution_id, status);
CREATE INDEX IF NOT EXISTS idx_jobs_runner ON jobs(runner_id, status);
CREATE INDEX IF NOT EXISTS idx_steps_job ON steps(job_id, ord);
CREATE INDEX IF NOT EXISTS idx_artifacts_expiry ON artifacts(expires_at);
";

// ============================================================================
// SECTION: Row Mappers
// ============================================================================

/// Maps a tenant row.
fn row_tenant(row: &Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: TenantId::new(id_value(row.get("id")?)?),
        name: row.get("name")?,
        slug: row.get("slug")?,
        plan: parse_label(&row.get::<_, String>("plan")?, TenantPlan::parse)?,
        quotas: TenantQuotas {
            max_runners: row.get("max_runners")?,
            max_concurrent_jobs: row.get("max_concurrent_jobs")?,
            retention_days: row.get("retention_days")?,
            storage_mb: row.get::<_, i64>("storage_mb")?.unsigned_abs(),
        },
        current_storage_mb: row.get::<_, i64>("current_storage_mb")?.unsigned_abs(),
        active: row.get("active")?,
        created_at: Timestamp::from_unix_millis(row.get("created_at")?),
    })
}

/// Maps a pipeline row.
fn row_pipeline(row: &Row<'_>) -> rusqlite::Result<Pipeline> {
    Ok(Pipeline {
        id: PipelineId::new(id_value(row.get("id")?)?),
        tenant_id: TenantId::new(id_value(row.get("tenant_id")?)?),
        name: row.get("name")?,
        slug: row.get("slug")?,
        repo_url: row.get("repo_url")?,
        default_branch: row.get("default_branch")?,
        config_path: row.get("config_path")?,
        webhook_secret: row.get("webhook_secret")?,
        active: row.get("active")?,
        last_execution_at: opt_ts(row.get("last_execution_at")?),
        created_at: Timestamp::from_unix_millis(row.get("created_at")?),
    })
}

/// Maps a configuration row.
fn row_config(row: &Row<'_>) -> rusqlite::Result<PipelineConfigRecord> {
    let parsed: Option<String> = row.get("parsed")?;
    Ok(PipelineConfigRecord {
        id: ConfigId::new(id_value(row.get("id")?)?),
        pipeline_id: PipelineId::new(id_value(row.get("pipeline_id")?)?),
        version: row.get::<_, i64>("version")?.unsigned_abs(),
        yaml_raw: row.get("yaml_raw")?,
        parsed: match parsed {
            Some(text) => Some(from_json(&text)?),
            None => None,
        },
        commit_sha: row.get("commit_sha")?,
        is_valid: row.get("is_valid")?,
        validation_errors: from_json(&row.get::<_, String>("validation_errors")?)?,
        created_at: Timestamp::from_unix_millis(row.get("created_at")?),
    })
}

/// Maps an execution row.
fn row_execution(row: &Row<'_>) -> rusqlite::Result<Execution> {
    let config_id: Option<i64> = row.get("config_id")?;
    let triggered_by: Option<i64> = row.get("triggered_by")?;
    Ok(Execution {
        id: ExecutionId::new(id_value(row.get("id")?)?),
        tenant_id: TenantId::new(id_value(row.get("tenant_id")?)?),
        pipeline_id: PipelineId::new(id_value(row.get("pipeline_id")?)?),
        config_id: match config_id {
            Some(raw) => Some(ConfigId::new(id_value(raw)?)),
            None => None,
        },
        number: row.get::<_, i64>("number")?.unsigned_abs(),
        trigger_type: parse_label(&row.get::<_, String>("trigger_type")?, TriggerType::parse)?,
        trigger_info: from_json(&row.get::<_, String>("trigger_info")?)?,
        status: parse_label(&row.get::<_, String>("status")?, RunStatus::parse)?,
        queued_at: opt_ts(row.get("queued_at")?),
        started_at: opt_ts(row.get("started_at")?),
        finished_at: opt_ts(row.get("finished_at")?),
        environment: from_json(&row.get::<_, String>("environment")?)?,
        inputs: from_json(&row.get::<_, String>("inputs")?)?,
        concurrency_group: ConcurrencyGroup::new(row.get::<_, String>("concurrency_group")?),
        cancel_in_progress: row.get("cancel_in_progress")?,
        triggered_by: match triggered_by {
            Some(raw) => Some(UserId::new(id_value(raw)?)),
            None => None,
        },
        created_at: Timestamp::from_unix_millis(row.get("created_at")?),
    })
}

/// Maps a job row.
fn row_job(row: &Row<'_>) -> rusqlite::Result<Job> {
    let runner_id: Option<i64> = row.get("runner_id")?;
    let container: Option<String> = row.get("container")?;
    let needs: Vec<String> = from_json(&row.get::<_, String>("needs")?)?;
    Ok(Job {
        id: JobId::new(id_value(row.get("id")?)?),
        execution_id: ExecutionId::new(id_value(row.get("execution_id")?)?),
        name: row.get("name")?,
        job_key: JobKey::new(row.get::<_, String>("job_key")?),
        needs: needs.into_iter().map(JobKey::new).collect(),
        condition: row.get("condition")?,
        matrix_values: from_json(&row.get::<_, String>("matrix_values")?)?,
        runs_on: from_json(&row.get::<_, String>("runs_on")?)?,
        container: match container {
            Some(text) => Some(from_json(&text)?),
            None => None,
        },
        services: from_json(&row.get::<_, String>("services")?)?,
        status: parse_label(&row.get::<_, String>("status")?, RunStatus::parse)?,
        runner_id: match runner_id {
            Some(raw) => Some(RunnerId::new(id_value(raw)?)),
            None => None,
        },
        timeout_minutes: row.get("timeout_minutes")?,
        outputs: from_json(&row.get::<_, String>("outputs")?)?,
        environment: from_json(&row.get::<_, String>("environment")?)?,
        queued_at: opt_ts(row.get("queued_at")?),
        started_at: opt_ts(row.get("started_at")?),
        finished_at: opt_ts(row.get("finished_at")?),
        created_at: Timestamp::from_unix_millis(row.get("created_at")?),
    })
}

/// Maps a step row.
fn row_step(row: &Row<'_>) -> rusqlite::Result<Step> {
    let step_type: String = row.get("step_type")?;
    Ok(Step {
        id: StepId::new(id_value(row.get("id")?)?),
        job_id: JobId::new(id_value(row.get("job_id")?)?),
        name: row.get("name")?,
        order: row.get("ord")?,
        step_type: if step_type == "uses" {
            StepType::Uses
        } else {
            StepType::Run
        },
        run_command: row.get("run_command")?,
        uses_action: row.get("uses_action")?,
        with_inputs: from_json(&row.get::<_, String>("with_inputs")?)?,
        shell: row.get("shell")?,
        working_directory: row.get("working_directory")?,
        env: from_json(&row.get::<_, String>("env")?)?,
        condition: row.get("condition")?,
        continue_on_error: row.get("continue_on_error")?,
        timeout_minutes: row.get("timeout_minutes")?,
        status: parse_label(&row.get::<_, String>("status")?, RunStatus::parse)?,
        exit_code: row.get("exit_code")?,
        started_at: opt_ts(row.get("started_at")?),
        finished_at: opt_ts(row.get("finished_at")?),
        outputs: from_json(&row.get::<_, String>("outputs")?)?,
    })
}

/// Maps a runner row.
fn row_runner(row: &Row<'_>) -> rusqlite::Result<Runner> {
    let tenant_id: Option<i64> = row.get("tenant_id")?;
    Ok(Runner {
        id: RunnerId::new(id_value(row.get("id")?)?),
        tenant_id: match tenant_id {
            Some(raw) => Some(TenantId::new(id_value(raw)?)),
            None => None,
        },
        name: row.get("name")?,
        token_hash: row.get("token_hash")?,
        runner_type: parse_label(&row.get::<_, String>("runner_type")?, RunnerType::parse)?,
        labels: from_json(&row.get::<_, String>("labels")?)?,
        capabilities: from_json(&row.get::<_, String>("capabilities")?)?,
        status: parse_label(&row.get::<_, String>("status")?, RunnerStatus::parse)?,
        last_heartbeat: opt_ts(row.get("last_heartbeat")?),
        system_info: from_json(&row.get::<_, String>("system_info")?)?,
        max_concurrent_jobs: row.get("max_concurrent_jobs")?,
        current_jobs: row.get("current_jobs")?,
        version: row.get("version")?,
        created_at: Timestamp::from_unix_millis(row.get("created_at")?),
    })
}

/// Maps a secret row.
fn row_secret(row: &Row<'_>) -> rusqlite::Result<Secret> {
    let pipeline_id: Option<i64> = row.get("pipeline_id")?;
    let updated_by: Option<i64> = row.get("last_updated_by")?;
    Ok(Secret {
        id: SecretId::new(id_value(row.get("id")?)?),
        tenant_id: TenantId::new(id_value(row.get("tenant_id")?)?),
        pipeline_id: match pipeline_id {
            Some(raw) => Some(PipelineId::new(id_value(raw)?)),
            None => None,
        },
        name: row.get("name")?,
        ciphertext: row.get("ciphertext")?,
        scope: parse_label(&row.get::<_, String>("scope")?, SecretScope::parse)?,
        last_updated_by: match updated_by {
            Some(raw) => Some(UserId::new(id_value(raw)?)),
            None => None,
        },
        created_at: Timestamp::from_unix_millis(row.get("created_at")?),
    })
}

/// Maps an artifact row.
fn row_artifact(row: &Row<'_>) -> rusqlite::Result<Artifact> {
    Ok(Artifact {
        id: ArtifactId::new(id_value(row.get("id")?)?),
        tenant_id: TenantId::new(id_value(row.get("tenant_id")?)?),
        execution_id: ExecutionId::new(id_value(row.get("execution_id")?)?),
        job_id: JobId::new(id_value(row.get("job_id")?)?),
        name: row.get("name")?,
        storage_path: row.get("storage_path")?,
        size_bytes: row.get::<_, i64>("size_bytes")?.unsigned_abs(),
        checksum_sha256: row.get("checksum_sha256")?,
        file_count: row.get("file_count")?,
        compression: row.get("compression")?,
        retention_days: row.get("retention_days")?,
        expires_at: Timestamp::from_unix_millis(row.get("expires_at")?),
        created_at: Timestamp::from_unix_millis(row.get("created_at")?),
    })
}

/// Maps an API key row.
fn row_api_key(row: &Row<'_>) -> rusqlite::Result<ApiKeyRecord> {
    let user_id: Option<i64> = row.get("user_id")?;
    Ok(ApiKeyRecord {
        id: ApiKeyId::new(id_value(row.get("id")?)?),
        tenant_id: TenantId::new(id_value(row.get("tenant_id")?)?),
        user_id: match user_id {
            Some(raw) => Some(UserId::new(id_value(raw)?)),
            None => None,
        },
        name: row.get("name")?,
        key_hash: row.get("key_hash")?,
        key_prefix: row.get("key_prefix")?,
        scopes: from_json(&row.get::<_, String>("scopes")?)?,
        active: row.get("active")?,
        expires_at: opt_ts(row.get("expires_at")?),
        last_used_at: opt_ts(row.get("last_used_at")?),
        created_at: Timestamp::from_unix_millis(row.get("created_at")?),
    })
}

// ============================================================================
// SECTION: Transaction Helpers
// ============================================================================

/// Cancels one execution and its non-terminal jobs inside a transaction.
fn cancel_execution_tx(
    tx: &rusqlite::Transaction<'_>,
    execution_id: i64,
    now: Timestamp,
) -> Result<Vec<CancelledJob>, StoreError> {
    let millis = now.as_unix_millis();
    let changed = tx
        .execute(
            "UPDATE executions SET status = 'cancelled', finished_at = ?1
             WHERE id = ?2 AND status IN ('pending', 'queued', 'running')",
            params![millis, execution_id],
        )
        .map_err(map_sql_error)?;
    if changed == 0 {
        return Ok(Vec::new());
    }

    let mut cancelled = Vec::new();
    {
        let mut statement = tx
            .prepare(
                "SELECT id, runner_id FROM jobs
                 WHERE execution_id = ?1 AND status IN ('pending', 'queued', 'running')",
            )
            .map_err(map_sql_error)?;
        let rows = statement
            .query_map([execution_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Option<i64>>(1)?))
            })
            .map_err(map_sql_error)?;
        for row in rows {
            let (job_raw, runner_raw) = row.map_err(map_sql_error)?;
            let job_id = JobId::new(id_value(job_raw).map_err(map_sql_error)?);
            let runner_id = match runner_raw {
                Some(raw) => Some(RunnerId::new(id_value(raw).map_err(map_sql_error)?)),
                None => None,
            };
            cancelled.push(CancelledJob {
                job_id,
                execution_id: ExecutionId::new(
                    id_value(execution_id).map_err(map_sql_error)?,
                ),
                runner_id,
            });
        }
    }

    tx.execute(
        "UPDATE runners SET current_jobs = MAX(current_jobs - 1, 0)
         WHERE id IN (SELECT runner_id FROM jobs
                      WHERE execution_id = ?1 AND runner_id IS NOT NULL
                        AND status IN ('pending', 'queued', 'running'))",
        [execution_id],
    )
    .map_err(map_sql_error)?;
    tx.execute(
        "UPDATE jobs SET status = 'cancelled', finished_at = ?1
         WHERE execution_id = ?2 AND status IN ('pending', 'queued', 'running')",
        params![millis, execution_id],
    )
    .map_err(map_sql_error)?;

    Ok(cancelled)
}

// ============================================================================
// SECTION: Store Implementation
// ============================================================================

impl ControlPlaneStore for SqliteStore {
    fn create_tenant(&self, new: NewTenant, now: Timestamp) -> Result<Tenant, StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO tenants
                 (name, slug, plan, max_runners, max_concurrent_jobs, retention_days,
                  storage_mb, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                new.name,
                new.slug,
                new.plan.as_str(),
                new.quotas.max_runners,
                new.quotas.max_concurrent_jobs,
                new.quotas.retention_days,
                i64::try_from(new.quotas.storage_mb).unwrap_or(i64::MAX),
                now.as_unix_millis(),
            ],
        )
        .map_err(map_sql_error)?;
        let id = conn.last_insert_rowid();
        conn.query_row("SELECT * FROM tenants WHERE id = ?1", [id], row_tenant)
            .map_err(map_sql_error)
    }

    fn tenant(&self, id: TenantId) -> Result<Option<Tenant>, StoreError> {
        self.lock()
            .query_row(
                "SELECT * FROM tenants WHERE id = ?1",
                [i64::try_from(id.get()).unwrap_or_default()],
                row_tenant,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, StoreError> {
        self.lock()
            .query_row(
                "SELECT * FROM tenants WHERE slug = ?1 AND active = 1",
                [slug],
                row_tenant,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn create_pipeline(&self, new: NewPipeline, now: Timestamp) -> Result<Pipeline, StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO pipelines
                 (tenant_id, name, slug, repo_url, default_branch, config_path,
                  webhook_secret, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                i64::try_from(new.tenant_id.get()).unwrap_or_default(),
                new.name,
                new.slug,
                new.repo_url,
                new.default_branch,
                new.config_path,
                new.webhook_secret,
                now.as_unix_millis(),
            ],
        )
        .map_err(map_sql_error)?;
        let id = conn.last_insert_rowid();
        conn.query_row("SELECT * FROM pipelines WHERE id = ?1", [id], row_pipeline)
            .map_err(map_sql_error)
    }

    fn pipeline(
        &self,
        tenant_id: TenantId,
        id: PipelineId,
    ) -> Result<Option<Pipeline>, StoreError> {
        self.lock()
            .query_row(
                "SELECT * FROM pipelines WHERE id = ?1 AND tenant_id = ?2",
                params![
                    i64::try_from(id.get()).unwrap_or_default(),
                    i64::try_from(tenant_id.get()).unwrap_or_default(),
                ],
                row_pipeline,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn pipelines_for_repo(&self, needles: &[String]) -> Result<Vec<Pipeline>, StoreError> {
        let conn = self.lock();
        let mut statement = conn
            .prepare("SELECT * FROM pipelines WHERE active = 1 ORDER BY id")
            .map_err(map_sql_error)?;
        let rows = statement.query_map([], row_pipeline).map_err(map_sql_error)?;
        let mut found = Vec::new();
        for row in rows {
            let pipeline = row.map_err(map_sql_error)?;
            if needles
                .iter()
                .any(|needle| !needle.is_empty() && pipeline.repo_url.contains(needle))
            {
                found.push(pipeline);
            }
        }
        Ok(found)
    }

    fn touch_pipeline(&self, id: PipelineId, at: Timestamp) -> Result<(), StoreError> {
        let changed = self
            .lock()
            .execute(
                "UPDATE pipelines SET last_execution_at = ?1 WHERE id = ?2",
                params![
                    at.as_unix_millis(),
                    i64::try_from(id.get()).unwrap_or_default(),
                ],
            )
            .map_err(map_sql_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("pipeline {id}")));
        }
        Ok(())
    }

    fn insert_config(
        &self,
        new: NewConfig,
        now: Timestamp,
    ) -> Result<PipelineConfigRecord, StoreError> {
        let parsed = match &new.parsed {
            Some(spec) => Some(to_json(spec)?),
            None => None,
        };
        let errors = to_json(&new.validation_errors)?;
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(map_sql_error)?;
        let pipeline_raw = i64::try_from(new.pipeline_id.get()).unwrap_or_default();
        let version: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(version), 0) + 1 FROM pipeline_configs
                 WHERE pipeline_id = ?1",
                [pipeline_raw],
                |row| row.get(0),
            )
            .map_err(map_sql_error)?;
        tx.execute(
            "INSERT INTO pipeline_configs
                 (pipeline_id, version, yaml_raw, parsed, commit_sha, is_valid,
                  validation_errors, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                pipeline_raw,
                version,
                new.yaml_raw,
                parsed,
                new.commit_sha,
                new.is_valid,
                errors,
                now.as_unix_millis(),
            ],
        )
        .map_err(map_sql_error)?;
        let id = tx.last_insert_rowid();
        let record = tx
            .query_row("SELECT * FROM pipeline_configs WHERE id = ?1", [id], row_config)
            .map_err(map_sql_error)?;
        tx.commit().map_err(map_sql_error)?;
        Ok(record)
    }

    fn latest_valid_config(
        &self,
        pipeline_id: PipelineId,
    ) -> Result<Option<PipelineConfigRecord>, StoreError> {
        self.lock()
            .query_row(
                "SELECT * FROM pipeline_configs
                 WHERE pipeline_id = ?1 AND is_valid = 1
                 ORDER BY version DESC LIMIT 1",
                [i64::try_from(pipeline_id.get()).unwrap_or_default()],
                row_config,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn config(&self, id: ConfigId) -> Result<Option<PipelineConfigRecord>, StoreError> {
        self.lock()
            .query_row(
                "SELECT * FROM pipeline_configs WHERE id = ?1",
                [i64::try_from(id.get()).unwrap_or_default()],
                row_config,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn commit_plan(
        &self,
        plan: &ExecutionPlan,
        now: Timestamp,
    ) -> Result<PlannedExecution, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(map_sql_error)?;
        let millis = now.as_unix_millis();
        let pipeline_raw = i64::try_from(plan.pipeline_id.get()).unwrap_or_default();

        // Group admission: cancel older in-flight members when requested.
        let mut cancelled = Vec::new();
        if !plan.concurrency_group.is_empty() && plan.cancel_in_progress {
            let older: Vec<i64> = {
                let mut statement = tx
                    .prepare(
                        "SELECT id FROM executions
                         WHERE pipeline_id = ?1 AND concurrency_group = ?2
                           AND status IN ('pending', 'queued', 'running')",
                    )
                    .map_err(map_sql_error)?;
                let rows = statement
                    .query_map(params![pipeline_raw, plan.concurrency_group.as_str()], |row| {
                        row.get(0)
                    })
                    .map_err(map_sql_error)?;
                rows.collect::<Result<_, _>>().map_err(map_sql_error)?
            };
            for execution_raw in older {
                cancelled.extend(cancel_execution_tx(&tx, execution_raw, now)?);
            }
        }

        let number: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(number), 0) + 1 FROM executions WHERE pipeline_id = ?1",
                [pipeline_raw],
                |row| row.get(0),
            )
            .map_err(map_sql_error)?;

        tx.execute(
            "INSERT INTO executions
                 (tenant_id, pipeline_id, config_id, number, trigger_type, trigger_info,
                  status, environment, inputs, concurrency_group, cancel_in_progress,
                  triggered_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                i64::try_from(plan.tenant_id.get()).unwrap_or_default(),
                pipeline_raw,
                plan.config_id
                    .map(|config| i64::try_from(config.get()).unwrap_or_default()),
                number,
                plan.trigger_type.as_str(),
                to_json(&plan.trigger_info)?,
                to_json(&Map::<String, Value>::new())?,
                to_json(&plan.inputs)?,
                plan.concurrency_group.as_str(),
                plan.cancel_in_progress,
                plan.triggered_by
                    .map(|user| i64::try_from(user.get()).unwrap_or_default()),
                millis,
            ],
        )
        .map_err(map_sql_error)?;
        let execution_raw = tx.last_insert_rowid();

        for planned in &plan.jobs {
            let needs: Vec<&str> = planned.needs.iter().map(JobKey::as_str).collect();
            let container = match &planned.container {
                Some(container) => Some(to_json(container)?),
                None => None,
            };
            tx.execute(
                "INSERT INTO jobs
                     (execution_id, name, job_key, needs, condition, matrix_values,
                      runs_on, container, services, status, timeout_minutes, outputs,
                      environment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', ?10, ?11, ?12, ?13)",
                params![
                    execution_raw,
                    planned.name,
                    planned.job_key.as_str(),
                    to_json(&needs)?,
                    planned.condition,
                    to_json(&planned.matrix_values)?,
                    to_json(&planned.runs_on)?,
                    container,
                    to_json(&planned.services)?,
                    planned.timeout_minutes,
                    to_json(&Map::<String, Value>::new())?,
                    to_json(&planned.environment)?,
                    millis,
                ],
            )
            .map_err(map_sql_error)?;
            let job_raw = tx.last_insert_rowid();

            for (index, step) in planned.steps.iter().enumerate() {
                let (step_type, run_command, uses_action, with_inputs) = match &step.action {
                    StepAction::Run { command } => {
                        ("run", command.clone(), String::new(), Map::new())
                    }
                    StepAction::Uses { action, with } => {
                        let mut inputs = Map::new();
                        for (key, value) in with {
                            inputs.insert(key.clone(), value.clone());
                        }
                        ("uses", String::new(), action.clone(), inputs)
                    }
                };
                let mut env = Map::new();
                for (key, value) in &step.env {
                    env.insert(key.clone(), Value::String(value.clone()));
                }
                tx.execute(
                    "INSERT INTO steps
                         (job_id, name, ord, step_type, run_command, uses_action,
                          with_inputs, shell, working_directory, env, condition,
                          continue_on_error, timeout_minutes, status, outputs)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                             'pending', ?14)",
                    params![
                        job_raw,
                        step.name,
                        i64::try_from(index).unwrap_or_default(),
                        step_type,
                        run_command,
                        uses_action,
                        to_json(&with_inputs)?,
                        step.shell,
                        step.working_directory,
                        to_json(&env)?,
                        step.condition,
                        step.continue_on_error,
                        step.timeout_minutes,
                        to_json(&Map::<String, Value>::new())?,
                    ],
                )
                .map_err(map_sql_error)?;
            }
        }

        tx.execute(
            "UPDATE pipelines SET last_execution_at = ?1 WHERE id = ?2",
            params![millis, pipeline_raw],
        )
        .map_err(map_sql_error)?;
        tx.execute(
            "INSERT INTO work_queue (execution_id, enqueued_at) VALUES (?1, ?2)",
            params![execution_raw, millis],
        )
        .map_err(map_sql_error)?;

        let execution = tx
            .query_row(
                "SELECT * FROM executions WHERE id = ?1",
                [execution_raw],
                row_execution,
            )
            .map_err(map_sql_error)?;
        let jobs = {
            let mut statement = tx
                .prepare("SELECT * FROM jobs WHERE execution_id = ?1 ORDER BY id")
                .map_err(map_sql_error)?;
            let rows = statement
                .query_map([execution_raw], row_job)
                .map_err(map_sql_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)?
        };
        tx.commit().map_err(map_sql_error)?;

        Ok(PlannedExecution {
            execution,
            jobs,
            cancelled,
        })
    }

    fn execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError> {
        self.lock()
            .query_row(
                "SELECT * FROM executions WHERE id = ?1",
                [i64::try_from(id.get()).unwrap_or_default()],
                row_execution,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn update_execution_status(
        &self,
        id: ExecutionId,
        status: RunStatus,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let millis = now.as_unix_millis();
        let raw = i64::try_from(id.get()).unwrap_or_default();
        let conn = self.lock();
        let sql = if status.is_terminal() {
            "UPDATE executions SET status = ?1, finished_at = ?2
             WHERE id = ?3 AND status IN ('pending', 'queued', 'running')"
        } else {
            match status {
                RunStatus::Queued => {
                    "UPDATE executions SET status = ?1,
                         queued_at = COALESCE(queued_at, ?2)
                     WHERE id = ?3 AND status IN ('pending', 'queued', 'running')"
                }
                RunStatus::Running => {
                    "UPDATE executions SET status = ?1,
                         started_at = COALESCE(started_at, ?2)
                     WHERE id = ?3 AND status IN ('pending', 'queued', 'running')"
                }
                _ => {
                    "UPDATE executions SET status = ?1
                     WHERE id = ?3 AND status IN ('pending', 'queued', 'running')
                       AND ?2 = ?2"
                }
            }
        };
        conn.execute(sql, params![status.as_str(), millis, raw])
            .map_err(map_sql_error)?;
        Ok(())
    }

    fn cancel_execution(
        &self,
        id: ExecutionId,
        now: Timestamp,
    ) -> Result<Vec<CancelledJob>, StoreError> {
        let raw = i64::try_from(id.get()).unwrap_or_default();
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(map_sql_error)?;
        let exists: Option<i64> = tx
            .query_row("SELECT id FROM executions WHERE id = ?1", [raw], |row| {
                row.get(0)
            })
            .optional()
            .map_err(map_sql_error)?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("execution {id}")));
        }
        let cancelled = cancel_execution_tx(&tx, raw, now)?;
        tx.commit().map_err(map_sql_error)?;
        Ok(cancelled)
    }

    fn executions_in_group(
        &self,
        pipeline_id: PipelineId,
        group: &ConcurrencyGroup,
    ) -> Result<Vec<Execution>, StoreError> {
        let conn = self.lock();
        let mut statement = conn
            .prepare(
                "SELECT * FROM executions
                 WHERE pipeline_id = ?1 AND concurrency_group = ?2
                   AND status IN ('pending', 'queued', 'running')
                 ORDER BY number",
            )
            .map_err(map_sql_error)?;
        let rows = statement
            .query_map(
                params![
                    i64::try_from(pipeline_id.get()).unwrap_or_default(),
                    group.as_str(),
                ],
                row_execution,
            )
            .map_err(map_sql_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)
    }

    fn dequeue_ready(&self) -> Result<Option<ExecutionId>, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(map_sql_error)?;
        let item: Option<(i64, i64)> = tx
            .query_row(
                "SELECT id, execution_id FROM work_queue ORDER BY id LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(map_sql_error)?;
        let Some((item_raw, execution_raw)) = item else {
            return Ok(None);
        };
        tx.execute("DELETE FROM work_queue WHERE id = ?1", [item_raw])
            .map_err(map_sql_error)?;
        tx.commit().map_err(map_sql_error)?;
        Ok(Some(ExecutionId::new(
            id_value(execution_raw).map_err(map_sql_error)?,
        )))
    }

    fn job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        self.lock()
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1",
                [i64::try_from(id.get()).unwrap_or_default()],
                row_job,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn jobs_for_execution(&self, execution_id: ExecutionId) -> Result<Vec<Job>, StoreError> {
        let conn = self.lock();
        let mut statement = conn
            .prepare("SELECT * FROM jobs WHERE execution_id = ?1 ORDER BY id")
            .map_err(map_sql_error)?;
        let rows = statement
            .query_map(
                [i64::try_from(execution_id.get()).unwrap_or_default()],
                row_job,
            )
            .map_err(map_sql_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)
    }

    fn mark_job_queued(&self, id: JobId, now: Timestamp) -> Result<(), StoreError> {
        self.lock()
            .execute(
                "UPDATE jobs SET status = 'queued', queued_at = COALESCE(queued_at, ?1)
                 WHERE id = ?2 AND status = 'pending'",
                params![
                    now.as_unix_millis(),
                    i64::try_from(id.get()).unwrap_or_default(),
                ],
            )
            .map_err(map_sql_error)?;
        Ok(())
    }

    fn claim_job(
        &self,
        job_id: JobId,
        runner_id: RunnerId,
        _now: Timestamp,
    ) -> Result<bool, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(map_sql_error)?;
        let job_raw = i64::try_from(job_id.get()).unwrap_or_default();
        let runner_raw = i64::try_from(runner_id.get()).unwrap_or_default();
        let claimed = tx
            .execute(
                "UPDATE jobs SET runner_id = ?1
                 WHERE id = ?2 AND status = 'queued' AND runner_id IS NULL",
                params![runner_raw, job_raw],
            )
            .map_err(map_sql_error)?;
        if claimed == 0 {
            return Ok(false);
        }
        let counted = tx
            .execute(
                "UPDATE runners SET current_jobs = current_jobs + 1 WHERE id = ?1",
                [runner_raw],
            )
            .map_err(map_sql_error)?;
        if counted == 0 {
            return Err(StoreError::NotFound(format!("runner {runner_id}")));
        }
        tx.commit().map_err(map_sql_error)?;
        Ok(true)
    }

    fn release_job(&self, job_id: JobId, runner_id: RunnerId) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(map_sql_error)?;
        let released = tx
            .execute(
                "UPDATE jobs SET runner_id = NULL WHERE id = ?1 AND runner_id = ?2",
                params![
                    i64::try_from(job_id.get()).unwrap_or_default(),
                    i64::try_from(runner_id.get()).unwrap_or_default(),
                ],
            )
            .map_err(map_sql_error)?;
        if released > 0 {
            tx.execute(
                "UPDATE runners SET current_jobs = MAX(current_jobs - 1, 0) WHERE id = ?1",
                [i64::try_from(runner_id.get()).unwrap_or_default()],
            )
            .map_err(map_sql_error)?;
        }
        tx.commit().map_err(map_sql_error)?;
        Ok(())
    }

    fn update_job_status(
        &self,
        id: JobId,
        status: RunStatus,
        outputs: Option<Map<String, Value>>,
        now: Timestamp,
    ) -> Result<Option<Job>, StoreError> {
        let raw = i64::try_from(id.get()).unwrap_or_default();
        let millis = now.as_unix_millis();
        let conn = self.lock();
        if status.is_terminal() {
            conn.execute(
                "UPDATE jobs SET status = ?1, finished_at = ?2,
                     outputs = COALESCE(?3, outputs)
                 WHERE id = ?4 AND status IN ('pending', 'queued', 'running')",
                params![
                    status.as_str(),
                    millis,
                    match &outputs {
                        Some(outputs) => Some(to_json(outputs)?),
                        None => None,
                    },
                    raw,
                ],
            )
            .map_err(map_sql_error)?;
        } else {
            let sql = match status {
                RunStatus::Queued => {
                    "UPDATE jobs SET status = ?1, queued_at = COALESCE(queued_at, ?2)
                     WHERE id = ?3 AND status IN ('pending', 'queued', 'running')"
                }
                RunStatus::Running => {
                    "UPDATE jobs SET status = ?1, started_at = COALESCE(started_at, ?2)
                     WHERE id = ?3 AND status IN ('pending', 'queued', 'running')"
                }
                _ => {
                    "UPDATE jobs SET status = ?1
                     WHERE id = ?3 AND status IN ('pending', 'queued', 'running')
                       AND ?2 = ?2"
                }
            };
            conn.execute(sql, params![status.as_str(), millis, raw])
                .map_err(map_sql_error)?;
        }
        conn.query_row("SELECT * FROM jobs WHERE id = ?1", [raw], row_job)
            .optional()
            .map_err(map_sql_error)
    }

    fn finish_job(
        &self,
        id: JobId,
        status: RunStatus,
        outputs: Map<String, Value>,
        now: Timestamp,
    ) -> Result<Option<Job>, StoreError> {
        let raw = i64::try_from(id.get()).unwrap_or_default();
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(map_sql_error)?;
        let finished = tx
            .execute(
                "UPDATE jobs SET status = ?1, finished_at = ?2, outputs = ?3
                 WHERE id = ?4 AND status IN ('pending', 'queued', 'running')",
                params![status.as_str(), now.as_unix_millis(), to_json(&outputs)?, raw],
            )
            .map_err(map_sql_error)?;
        if finished > 0 {
            tx.execute(
                "UPDATE runners SET current_jobs = MAX(current_jobs - 1, 0)
                 WHERE id = (SELECT runner_id FROM jobs WHERE id = ?1)",
                [raw],
            )
            .map_err(map_sql_error)?;
        }
        let job = tx
            .query_row("SELECT * FROM jobs WHERE id = ?1", [raw], row_job)
            .optional()
            .map_err(map_sql_error)?;
        tx.commit().map_err(map_sql_error)?;
        Ok(job)
    }

    fn requeue_runner_jobs(
        &self,
        runner_id: RunnerId,
        _now: Timestamp,
    ) -> Result<Vec<JobId>, StoreError> {
        let raw = i64::try_from(runner_id.get()).unwrap_or_default();
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(map_sql_error)?;
        let requeued: Vec<i64> = {
            let mut statement = tx
                .prepare(
                    "SELECT id FROM jobs
                     WHERE runner_id = ?1 AND status IN ('pending', 'queued', 'running')",
                )
                .map_err(map_sql_error)?;
            let rows = statement
                .query_map([raw], |row| row.get(0))
                .map_err(map_sql_error)?;
            rows.collect::<Result<_, _>>().map_err(map_sql_error)?
        };
        tx.execute(
            "UPDATE jobs SET status = 'pending', runner_id = NULL,
                 queued_at = NULL, started_at = NULL
             WHERE runner_id = ?1 AND status IN ('pending', 'queued', 'running')",
            [raw],
        )
        .map_err(map_sql_error)?;
        tx.execute("UPDATE runners SET current_jobs = 0 WHERE id = ?1", [raw])
            .map_err(map_sql_error)?;
        tx.commit().map_err(map_sql_error)?;
        requeued
            .into_iter()
            .map(|job_raw| {
                id_value(job_raw)
                    .map(JobId::new)
                    .map_err(map_sql_error)
            })
            .collect()
    }

    fn running_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let conn = self.lock();
        let mut statement = conn
            .prepare("SELECT * FROM jobs WHERE status = 'running'")
            .map_err(map_sql_error)?;
        let rows = statement.query_map([], row_job).map_err(map_sql_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)
    }

    fn queued_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let conn = self.lock();
        let mut statement = conn
            .prepare(
                "SELECT * FROM jobs WHERE status = 'queued' AND runner_id IS NULL
                 ORDER BY queued_at, id",
            )
            .map_err(map_sql_error)?;
        let rows = statement.query_map([], row_job).map_err(map_sql_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)
    }

    fn step(&self, id: StepId) -> Result<Option<Step>, StoreError> {
        self.lock()
            .query_row(
                "SELECT * FROM steps WHERE id = ?1",
                [i64::try_from(id.get()).unwrap_or_default()],
                row_step,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn steps_for_job(&self, job_id: JobId) -> Result<Vec<Step>, StoreError> {
        let conn = self.lock();
        let mut statement = conn
            .prepare("SELECT * FROM steps WHERE job_id = ?1 ORDER BY ord")
            .map_err(map_sql_error)?;
        let rows = statement
            .query_map([i64::try_from(job_id.get()).unwrap_or_default()], row_step)
            .map_err(map_sql_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)
    }

    fn update_step_status(
        &self,
        id: StepId,
        status: RunStatus,
        exit_code: Option<i32>,
        outputs: Option<Map<String, Value>>,
        now: Timestamp,
    ) -> Result<Option<Step>, StoreError> {
        let raw = i64::try_from(id.get()).unwrap_or_default();
        let millis = now.as_unix_millis();
        let conn = self.lock();
        if status.is_terminal() {
            conn.execute(
                "UPDATE steps SET status = ?1, finished_at = ?2,
                     exit_code = COALESCE(?3, exit_code),
                     outputs = COALESCE(?4, outputs)
                 WHERE id = ?5 AND status IN ('pending', 'queued', 'running')",
                params![
                    status.as_str(),
                    millis,
                    exit_code,
                    match &outputs {
                        Some(outputs) => Some(to_json(outputs)?),
                        None => None,
                    },
                    raw,
                ],
            )
            .map_err(map_sql_error)?;
        } else {
            conn.execute(
                "UPDATE steps SET status = ?1,
                     started_at = CASE WHEN ?1 = 'running'
                         THEN COALESCE(started_at, ?2) ELSE started_at END,
                     exit_code = COALESCE(?3, exit_code)
                 WHERE id = ?4 AND status IN ('pending', 'queued', 'running')",
                params![status.as_str(), millis, exit_code, raw],
            )
            .map_err(map_sql_error)?;
        }
        conn.query_row("SELECT * FROM steps WHERE id = ?1", [raw], row_step)
            .optional()
            .map_err(map_sql_error)
    }

    fn append_log_chunk(
        &self,
        step_id: StepId,
        content: String,
        level: LogLevel,
        timestamp: Timestamp,
    ) -> Result<LogChunk, StoreError> {
        let raw = i64::try_from(step_id.get()).unwrap_or_default();
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(map_sql_error)?;
        let exists: Option<i64> = tx
            .query_row("SELECT id FROM steps WHERE id = ?1", [raw], |row| row.get(0))
            .optional()
            .map_err(map_sql_error)?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("step {step_id}")));
        }
        let chunk_number: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(chunk_number) + 1, 0) FROM log_chunks
                 WHERE step_id = ?1",
                [raw],
                |row| row.get(0),
            )
            .map_err(map_sql_error)?;
        tx.execute(
            "INSERT INTO log_chunks (step_id, chunk_number, content, level, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                raw,
                chunk_number,
                content,
                level.as_str(),
                timestamp.as_unix_millis(),
            ],
        )
        .map_err(map_sql_error)?;
        tx.commit().map_err(map_sql_error)?;
        Ok(LogChunk {
            step_id,
            chunk_number: chunk_number.unsigned_abs(),
            content,
            level,
            timestamp,
        })
    }

    fn log_backlog(
        &self,
        execution_id: ExecutionId,
        job_id: Option<JobId>,
        limit: usize,
    ) -> Result<Vec<LogRecord>, StoreError> {
        let conn = self.lock();
        let mut statement = conn
            .prepare(
                "SELECT steps.job_id AS job_id, log_chunks.step_id AS step_id,
                        log_chunks.chunk_number AS chunk_number,
                        log_chunks.content AS content, log_chunks.level AS level,
                        log_chunks.timestamp AS timestamp
                 FROM log_chunks
                 JOIN steps ON steps.id = log_chunks.step_id
                 JOIN jobs ON jobs.id = steps.job_id
                 WHERE jobs.execution_id = ?1
                   AND (?2 IS NULL OR jobs.id = ?2)
                 ORDER BY steps.job_id, steps.ord, log_chunks.chunk_number
                 LIMIT ?3",
            )
            .map_err(map_sql_error)?;
        let rows = statement
            .query_map(
                params![
                    i64::try_from(execution_id.get()).unwrap_or_default(),
                    job_id.map(|job| i64::try_from(job.get()).unwrap_or_default()),
                    i64::try_from(limit).unwrap_or(i64::MAX),
                ],
                |row| {
                    Ok(LogRecord {
                        job_id: JobId::new(id_value(row.get("job_id")?)?),
                        chunk: LogChunk {
                            step_id: StepId::new(id_value(row.get("step_id")?)?),
                            chunk_number: row.get::<_, i64>("chunk_number")?.unsigned_abs(),
                            content: row.get("content")?,
                            level: parse_label(&row.get::<_, String>("level")?, LogLevel::parse)?,
                            timestamp: Timestamp::from_unix_millis(row.get("timestamp")?),
                        },
                    })
                },
            )
            .map_err(map_sql_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)
    }

    fn create_runner(&self, new: NewRunner, now: Timestamp) -> Result<Runner, StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO runners
                 (tenant_id, name, token_hash, runner_type, labels, capabilities,
                  status, system_info, max_concurrent_jobs, version, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'offline', ?7, ?8, ?9, ?10)",
            params![
                new.tenant_id
                    .map(|tenant| i64::try_from(tenant.get()).unwrap_or_default()),
                new.name,
                new.token_hash,
                new.runner_type.as_str(),
                to_json(&new.labels)?,
                to_json(&Map::<String, Value>::new())?,
                to_json(&Map::<String, Value>::new())?,
                new.max_concurrent_jobs,
                new.version,
                now.as_unix_millis(),
            ],
        )
        .map_err(map_sql_error)?;
        let id = conn.last_insert_rowid();
        conn.query_row("SELECT * FROM runners WHERE id = ?1", [id], row_runner)
            .map_err(map_sql_error)
    }

    fn runner(&self, id: RunnerId) -> Result<Option<Runner>, StoreError> {
        self.lock()
            .query_row(
                "SELECT * FROM runners WHERE id = ?1",
                [i64::try_from(id.get()).unwrap_or_default()],
                row_runner,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn update_runner_heartbeat(
        &self,
        id: RunnerId,
        system_info: Map<String, Value>,
        current_jobs: u32,
        now: Timestamp,
    ) -> Result<Option<Runner>, StoreError> {
        let raw = i64::try_from(id.get()).unwrap_or_default();
        let conn = self.lock();
        conn.execute(
            "UPDATE runners SET last_heartbeat = ?1, system_info = ?2, current_jobs = ?3,
                 status = CASE WHEN status = 'offline' THEN 'online' ELSE status END
             WHERE id = ?4",
            params![
                now.as_unix_millis(),
                to_json(&system_info)?,
                current_jobs,
                raw,
            ],
        )
        .map_err(map_sql_error)?;
        conn.query_row("SELECT * FROM runners WHERE id = ?1", [raw], row_runner)
            .optional()
            .map_err(map_sql_error)
    }

    fn set_runner_status(&self, id: RunnerId, status: RunnerStatus) -> Result<(), StoreError> {
        let changed = self
            .lock()
            .execute(
                "UPDATE runners SET status = ?1 WHERE id = ?2",
                params![status.as_str(), i64::try_from(id.get()).unwrap_or_default()],
            )
            .map_err(map_sql_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("runner {id}")));
        }
        Ok(())
    }

    fn candidate_runners(&self, tenant_id: TenantId) -> Result<Vec<Runner>, StoreError> {
        let conn = self.lock();
        let mut statement = conn
            .prepare(
                "SELECT * FROM runners
                 WHERE tenant_id = ?1 OR runner_type = 'shared'
                 ORDER BY id",
            )
            .map_err(map_sql_error)?;
        let rows = statement
            .query_map(
                [i64::try_from(tenant_id.get()).unwrap_or_default()],
                row_runner,
            )
            .map_err(map_sql_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)
    }

    fn stale_runners(
        &self,
        now: Timestamp,
        threshold_seconds: i64,
    ) -> Result<Vec<Runner>, StoreError> {
        let cutoff = now.as_unix_millis() - threshold_seconds.saturating_mul(1_000);
        let conn = self.lock();
        let mut statement = conn
            .prepare(
                "SELECT * FROM runners
                 WHERE status = 'online'
                   AND (last_heartbeat IS NULL OR last_heartbeat < ?1)",
            )
            .map_err(map_sql_error)?;
        let rows = statement
            .query_map([cutoff], row_runner)
            .map_err(map_sql_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)
    }

    fn create_secret(&self, new: NewSecret, now: Timestamp) -> Result<Secret, StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO secrets
                 (tenant_id, pipeline_id, name, ciphertext, scope, last_updated_by,
                  created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                i64::try_from(new.tenant_id.get()).unwrap_or_default(),
                new.pipeline_id
                    .map(|pipeline| i64::try_from(pipeline.get()).unwrap_or_default()),
                new.name,
                new.ciphertext,
                new.scope.as_str(),
                new.updated_by
                    .map(|user| i64::try_from(user.get()).unwrap_or_default()),
                now.as_unix_millis(),
            ],
        )
        .map_err(map_sql_error)?;
        let id = conn.last_insert_rowid();
        conn.query_row("SELECT * FROM secrets WHERE id = ?1", [id], row_secret)
            .map_err(map_sql_error)
    }

    fn secrets_for_pipeline(
        &self,
        tenant_id: TenantId,
        pipeline_id: PipelineId,
    ) -> Result<Vec<Secret>, StoreError> {
        let conn = self.lock();
        let mut statement = conn
            .prepare(
                "SELECT * FROM secrets
                 WHERE tenant_id = ?1 AND (pipeline_id IS NULL OR pipeline_id = ?2)
                 ORDER BY name",
            )
            .map_err(map_sql_error)?;
        let rows = statement
            .query_map(
                params![
                    i64::try_from(tenant_id.get()).unwrap_or_default(),
                    i64::try_from(pipeline_id.get()).unwrap_or_default(),
                ],
                row_secret,
            )
            .map_err(map_sql_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)
    }

    fn secret(&self, tenant_id: TenantId, id: SecretId) -> Result<Option<Secret>, StoreError> {
        self.lock()
            .query_row(
                "SELECT * FROM secrets WHERE id = ?1 AND tenant_id = ?2",
                params![
                    i64::try_from(id.get()).unwrap_or_default(),
                    i64::try_from(tenant_id.get()).unwrap_or_default(),
                ],
                row_secret,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn create_artifact(&self, new: NewArtifact, now: Timestamp) -> Result<Artifact, StoreError> {
        let conn = self.lock();
        let job_exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM jobs WHERE id = ?1",
                [i64::try_from(new.job_id.get()).unwrap_or_default()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sql_error)?;
        if job_exists.is_none() {
            return Err(StoreError::NotFound(format!("job {}", new.job_id)));
        }
        let expires_at = now.plus_days(i64::from(new.retention_days));
        conn.execute(
            "INSERT INTO artifacts
                 (tenant_id, execution_id, job_id, name, storage_path, size_bytes,
                  checksum_sha256, file_count, compression, retention_days,
                  expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                i64::try_from(new.tenant_id.get()).unwrap_or_default(),
                i64::try_from(new.execution_id.get()).unwrap_or_default(),
                i64::try_from(new.job_id.get()).unwrap_or_default(),
                new.name,
                new.storage_path,
                i64::try_from(new.size_bytes).unwrap_or(i64::MAX),
                new.checksum_sha256,
                new.file_count,
                new.compression,
                new.retention_days,
                expires_at.as_unix_millis(),
                now.as_unix_millis(),
            ],
        )
        .map_err(map_sql_error)?;
        let id = conn.last_insert_rowid();
        conn.query_row("SELECT * FROM artifacts WHERE id = ?1", [id], row_artifact)
            .map_err(map_sql_error)
    }

    fn artifact(
        &self,
        tenant_id: TenantId,
        id: ArtifactId,
    ) -> Result<Option<Artifact>, StoreError> {
        self.lock()
            .query_row(
                "SELECT * FROM artifacts WHERE id = ?1 AND tenant_id = ?2",
                params![
                    i64::try_from(id.get()).unwrap_or_default(),
                    i64::try_from(tenant_id.get()).unwrap_or_default(),
                ],
                row_artifact,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn create_api_key(
        &self,
        new: NewApiKey,
        now: Timestamp,
    ) -> Result<ApiKeyRecord, StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO api_keys
                 (tenant_id, user_id, name, key_hash, key_prefix, scopes, expires_at,
                  created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                i64::try_from(new.tenant_id.get()).unwrap_or_default(),
                new.user_id
                    .map(|user| i64::try_from(user.get()).unwrap_or_default()),
                new.name,
                new.key_hash,
                new.key_prefix,
                to_json(&new.scopes)?,
                new.expires_at.map(Timestamp::as_unix_millis),
                now.as_unix_millis(),
            ],
        )
        .map_err(map_sql_error)?;
        let id = conn.last_insert_rowid();
        conn.query_row("SELECT * FROM api_keys WHERE id = ?1", [id], row_api_key)
            .map_err(map_sql_error)
    }

    fn api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        self.lock()
            .query_row(
                "SELECT * FROM api_keys WHERE key_hash = ?1",
                [key_hash],
                row_api_key,
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn record_api_key_use(&self, id: ApiKeyId, now: Timestamp) -> Result<(), StoreError> {
        self.lock()
            .execute(
                "UPDATE api_keys SET last_used_at = ?1 WHERE id = ?2",
                params![
                    now.as_unix_millis(),
                    i64::try_from(id.get()).unwrap_or_default(),
                ],
            )
            .map_err(map_sql_error)?;
        Ok(())
    }

    fn readiness(&self) -> Result<(), StoreError> {
        self.lock()
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(map_sql_error)
    }
}
