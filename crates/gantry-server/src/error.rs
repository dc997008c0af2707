// crates/gantry-server/src/error.rs
// ============================================================================
// Module: API Error Taxonomy
// Description: Error classification and HTTP status mapping.
// Purpose: Keep error semantics stable and never leak internal detail.
// Dependencies: axum, gantry-core, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! One taxonomy covers the whole surface: validation (400 with field-path
//! details), authorization (401/403, never revealing whether an identifier
//! exists), not-found and gone (404/410), conflicts (409), transient
//! backend failures (503 after bounded retries at the caller), and fatal
//! internal errors (500 with no leaked detail, logged with context).

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use gantry_core::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// API-surface errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages in 4xx variants are safe to return to callers; 5xx responses
///   never carry internal detail.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Configuration or input validation failed.
    #[error("validation failed")]
    Validation(Vec<String>),
    /// Missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,
    /// Authenticated but not allowed.
    #[error("forbidden")]
    Forbidden,
    /// Entity does not exist (or belongs to another tenant).
    #[error("not found")]
    NotFound,
    /// Entity existed but is expired.
    #[error("gone")]
    Gone,
    /// Unique-constraint conflict.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Malformed request body or headers.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Transient backend failure after bounded retries.
    #[error("temporarily unavailable")]
    Transient,
    /// Unexpected internal failure.
    #[error("internal error")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::NotFound(_) => Self::NotFound,
            StoreError::Io(_) => Self::Transient,
            StoreError::Invalid(message) | StoreError::Store(message) => Self::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "validation failed", "details": errors}),
            ),
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({"error": message}))
            }
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({"error": "invalid credentials"}),
            ),
            Self::Forbidden => (StatusCode::FORBIDDEN, json!({"error": "forbidden"})),
            Self::NotFound => (StatusCode::NOT_FOUND, json!({"error": "not found"})),
            Self::Gone => (StatusCode::GONE, json!({"error": "expired"})),
            Self::Conflict(message) => (StatusCode::CONFLICT, json!({"error": message})),
            Self::Transient => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({"error": "temporarily unavailable"}),
            ),
            Self::Internal(message) => {
                error!(%message, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "internal error"}),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
