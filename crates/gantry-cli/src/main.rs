// crates/gantry-cli/src/main.rs
// ============================================================================
// Module: Gantry CLI Entry Point
// Description: Command dispatcher for the control-plane server and tooling.
// Purpose: Serve the control plane and validate workflow files locally.
// Dependencies: clap, gantry-config, gantry-core, gantry-server, gantry-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! `gantry serve` runs the control plane against the configured store and
//! bind address; `gantry validate` loads a workflow file the same way the
//! server would and reports every accumulated error. Configuration comes
//! from environment variables and is validated before anything binds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use gantry_config::load_workflow;
use gantry_core::ControlPlaneStore;
use gantry_core::InMemoryStore;
use gantry_server::AppState;
use gantry_server::Config;
use gantry_server::router;
use gantry_server::run_maintenance;
use gantry_store_sqlite::SqliteJournalMode;
use gantry_store_sqlite::SqliteStore;
use gantry_store_sqlite::SqliteStoreConfig;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Command Line
// ============================================================================

/// Gantry CI/CD control plane.
#[derive(Debug, Parser)]
#[command(name = "gantry", version, about = "Gantry CI/CD control plane")]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Supported commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Run the control-plane server.
    Serve,
    /// Validate a workflow YAML file and report every error.
    Validate {
        /// Path to the workflow file.
        path: PathBuf,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::Serve => serve(),
        Command::Validate { path } => validate(&path),
    }
}

/// Runs the server until interrupted.
fn serve() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(problems) => {
            error!("{problems}");
            return ExitCode::FAILURE;
        }
    };

    let store: Arc<dyn ControlPlaneStore> = match &config.db_path {
        Some(path) => {
            let store_config = SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: 5_000,
                journal_mode: SqliteJournalMode::Wal,
            };
            match SqliteStore::open(&store_config) {
                Ok(store) => Arc::new(store),
                Err(problem) => {
                    error!("failed to open store: {problem}");
                    return ExitCode::FAILURE;
                }
            }
        }
        None => {
            info!("no database path configured, using the in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let bind_addr = config.bind_addr;
    let state = AppState::new(config, store);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(problem) => {
            error!("failed to start runtime: {problem}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        let listener = match tokio::net::TcpListener::bind(bind_addr).await {
            Ok(listener) => listener,
            Err(problem) => {
                error!("failed to bind {bind_addr}: {problem}");
                return ExitCode::FAILURE;
            }
        };
        info!(%bind_addr, "gantry control plane listening");

        tokio::spawn(run_maintenance(Arc::clone(&state)));

        let app = router(state);
        match axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            Ok(()) => ExitCode::SUCCESS,
            Err(problem) => {
                error!("server error: {problem}");
                ExitCode::FAILURE
            }
        }
    })
}

/// Resolves when the process receives an interrupt.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        error!("failed to install interrupt handler");
        std::future::pending::<()>().await;
    }
}

/// Validates a workflow file and reports the outcome.
fn validate(path: &std::path::Path) -> ExitCode {
    let yaml_raw = match std::fs::read_to_string(path) {
        Ok(yaml_raw) => yaml_raw,
        Err(problem) => {
            error!("failed to read {}: {problem}", path.display());
            return ExitCode::FAILURE;
        }
    };

    let outcome = load_workflow(&yaml_raw);
    if outcome.is_valid() {
        info!("{} is valid", path.display());
        ExitCode::SUCCESS
    } else {
        for problem in &outcome.errors {
            error!("{problem}");
        }
        ExitCode::FAILURE
    }
}
