// crates/gantry-server/src/registry.rs
// ============================================================================
// Module: Runner Session Registry
// Description: In-memory mirror of live runner sessions.
// Purpose: Route targeted frames to connected runners; storage stays authoritative.
// Dependencies: gantry-core, tokio, crate::protocol
// ============================================================================

//! ## Overview
//! Runner state is authoritative in storage; the registry only mirrors
//! which runners currently hold a live session and the channel to reach
//! them. Dispatch consults the registry before claiming a job so
//! assignments never target a dead session, and a failed send after a claim
//! rolls the claim back.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use gantry_core::RunnerId;
use gantry_core::TenantId;
use tokio::sync::mpsc;

use crate::protocol::ServerFrame;

// ============================================================================
// SECTION: Session Handles
// ============================================================================

/// Handle to one live runner session.
///
/// # Invariants
/// - Dropping the receiver side closes the handle; sends then fail and the
///   caller treats the runner as disconnected.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Tenant binding of the runner (`None` for shared runners).
    pub tenant_id: Option<TenantId>,
    /// Outbound frame channel into the session task.
    sender: mpsc::UnboundedSender<ServerFrame>,
}

impl SessionHandle {
    /// Creates a handle over an outbound channel.
    #[must_use]
    pub const fn new(
        tenant_id: Option<TenantId>,
        sender: mpsc::UnboundedSender<ServerFrame>,
    ) -> Self {
        Self { tenant_id, sender }
    }

    /// Sends a frame into the session. Returns false when the session is
    /// gone.
    #[must_use]
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.sender.send(frame).is_ok()
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registry of live runner sessions addressed by runner identifier.
///
/// # Invariants
/// - At most one session per runner; a new session replaces the old handle.
#[derive(Debug, Default)]
pub struct RunnerRegistry {
    /// Live sessions by raw runner identifier.
    sessions: Mutex<HashMap<u64, SessionHandle>>,
}

impl RunnerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the session table, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches a session, replacing any previous one for the runner.
    pub fn attach(&self, runner_id: RunnerId, handle: SessionHandle) {
        self.lock().insert(runner_id.get(), handle);
    }

    /// Detaches a session (no-op when already gone).
    pub fn detach(&self, runner_id: RunnerId) {
        self.lock().remove(&runner_id.get());
    }

    /// Returns true when the runner holds a live session.
    #[must_use]
    pub fn is_connected(&self, runner_id: RunnerId) -> bool {
        self.lock().contains_key(&runner_id.get())
    }

    /// Sends a targeted frame to one runner's session.
    ///
    /// Returns false when no live session exists or the session channel is
    /// closed.
    #[must_use]
    pub fn send_to(&self, runner_id: RunnerId, frame: ServerFrame) -> bool {
        let handle = {
            let sessions = self.lock();
            sessions.get(&runner_id.get()).cloned()
        };
        handle.is_some_and(|handle| handle.send(frame))
    }

    /// Broadcasts a frame to every connected runner of a tenant.
    ///
    /// Shared runners carry no tenant binding and are not addressed by
    /// tenant broadcasts.
    pub fn broadcast_tenant(&self, tenant_id: TenantId, frame: &ServerFrame) {
        let handles: Vec<SessionHandle> = {
            let sessions = self.lock();
            sessions
                .values()
                .filter(|handle| handle.tenant_id == Some(tenant_id))
                .cloned()
                .collect()
        };
        for handle in handles {
            let _ = handle.send(frame.clone());
        }
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.lock().len()
    }
}
