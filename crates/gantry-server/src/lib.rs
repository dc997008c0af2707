// crates/gantry-server/src/lib.rs
// ============================================================================
// Module: Gantry Server
// Description: Control-plane server wiring and shared application state.
// Purpose: Compose storage, scheduling, sessions, and ingress into one app.
// Dependencies: axum, gantry-core, tokio, tracing
// ============================================================================

//! ## Overview
//! `gantry-server` assembles the control plane: tenant resolution and token
//! auth, the secrets cipher, the runner registry and scheduler, runner
//! session handling, the log fan-out bus, and webhook ingress. The wall
//! clock enters the system exactly once, through [`AppState::now`]; every
//! other layer receives explicit timestamps.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Token authentication.
pub mod auth;
/// Log fan-out bus.
pub mod bus;
/// Server configuration.
pub mod config;
/// API error taxonomy.
pub mod error;
/// Execution launcher.
pub mod planner;
/// Runner protocol frames.
pub mod protocol;
/// Live session registry.
pub mod registry;
/// HTTP routes.
pub mod routes;
/// Runner scheduler.
pub mod scheduler;
/// Secrets cipher.
pub mod secrets;
/// Runner session handling.
pub mod session;
/// Telemetry hooks.
pub mod telemetry;
/// Tenant resolution.
pub mod tenant;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use gantry_core::ControlPlaneStore;
use gantry_core::Timestamp;
use tracing::warn;

use crate::bus::LogBus;
use crate::config::ServerConfig;
use crate::planner::ExecutionLauncher;
use crate::registry::RunnerRegistry;
use crate::scheduler::Scheduler;
use crate::secrets::SecretCipher;
use crate::telemetry::ControlPlaneMetrics;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use crate::config::ConfigError;
pub use crate::config::DeploymentMode;
pub use crate::config::ServerConfig as Config;
pub use crate::routes::router;

// ============================================================================
// SECTION: Application State
// ============================================================================

/// Shared application state threaded through handlers and sessions.
pub struct AppState {
    /// Validated server configuration.
    pub config: ServerConfig,
    /// Authoritative storage.
    pub store: Arc<dyn ControlPlaneStore>,
    /// Live runner session registry.
    pub registry: Arc<RunnerRegistry>,
    /// Log fan-out bus.
    pub bus: Arc<LogBus>,
    /// Runner scheduler.
    pub scheduler: Arc<Scheduler>,
    /// Execution launcher.
    pub launcher: Arc<ExecutionLauncher>,
    /// Secrets cipher.
    pub cipher: Arc<SecretCipher>,
    /// Metrics sink.
    pub metrics: Arc<dyn ControlPlaneMetrics>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Builds the application state over a store.
    #[must_use]
    pub fn new(config: ServerConfig, store: Arc<dyn ControlPlaneStore>) -> Arc<Self> {
        Self::with_metrics(config, store, Arc::new(NoopMetrics))
    }

    /// Builds the application state with an explicit metrics sink.
    #[must_use]
    pub fn with_metrics(
        config: ServerConfig,
        store: Arc<dyn ControlPlaneStore>,
        metrics: Arc<dyn ControlPlaneMetrics>,
    ) -> Arc<Self> {
        let registry = Arc::new(RunnerRegistry::new());
        let bus = Arc::new(LogBus::default());
        let cipher = Arc::new(SecretCipher::new(config.secret_encryption_key.clone()));
        let offline_threshold =
            i64::try_from(config.offline_threshold_secs).unwrap_or(i64::MAX);
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&bus),
            Arc::clone(&cipher),
            offline_threshold,
        ));
        let launcher = Arc::new(ExecutionLauncher::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&bus),
        ));
        Arc::new(Self {
            config,
            store,
            registry,
            bus,
            scheduler,
            launcher,
            cipher,
            metrics,
        })
    }

    /// Reads the wall clock as a control-plane timestamp.
    ///
    /// This is the single point where real time enters the system.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
            });
        Timestamp::from_unix_millis(millis)
    }
}

// ============================================================================
// SECTION: Maintenance Loop
// ============================================================================

/// Runs the periodic maintenance sweeps until the process exits.
///
/// Each tick drains the execution-ready outbox, marks silent runners
/// offline (requeueing their jobs), and times out jobs past their budget.
pub async fn run_maintenance(state: Arc<AppState>) {
    let period = Duration::from_secs(state.config.heartbeat_interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let now = state.now();
        if let Err(error) = state.scheduler.process_ready_queue(now) {
            warn!(%error, "ready-queue sweep failed");
        }
        if let Err(error) = state.scheduler.sweep_offline(now) {
            warn!(%error, "offline sweep failed");
        }
        if let Err(error) = state.scheduler.sweep_timeouts(now) {
            warn!(%error, "timeout sweep failed");
        }
    }
}
