// crates/gantry-webhook/src/lib.rs
// ============================================================================
// Module: Gantry Webhook
// Description: Webhook signature verification and event normalization.
// Purpose: Authenticate inbound deliveries and parse them into core events.
// Dependencies: gantry-core, hex, hmac, serde_json, sha2, subtle, tracing
// ============================================================================

//! ## Overview
//! Inbound webhook deliveries are untrusted until their HMAC-SHA256
//! signature verifies against a pipeline's secret; digest comparison is
//! constant-time. Verified payloads are normalized into the core event
//! records consumed by the trigger matcher. Unknown event types parse to
//! nothing; `ping` deliveries are acknowledged without ever triggering
//! pipelines.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Payload parsing into core events.
pub mod event;
/// HMAC signature verification.
pub mod signature;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use crate::event::parse_event;
pub use crate::signature::SIGNATURE_PREFIX;
pub use crate::signature::compute_signature;
pub use crate::signature::verify_for_pipelines;
pub use crate::signature::verify_signature;
