// crates/gantry-server/src/routes/artifact.rs
// ============================================================================
// Module: Artifact Download Route
// Description: Signed-location handoff for stored artifacts.
// Purpose: Gate artifact reads on tenant ownership and expiry.
// Dependencies: axum, gantry-core, serde_json
// ============================================================================

//! ## Overview
//! The control plane never serves artifact bytes; the blob backend is an
//! external collaborator. Download requests resolve the caller's tenant,
//! check ownership and expiry, and return a location reference the backend
//! can serve. Reads past `expires_at` fail with 410; a foreign tenant's
//! artifact is indistinguishable from a missing one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::response::Response;
use gantry_core::ArtifactId;
use serde_json::json;

use crate::AppState;
use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::tenant::API_KEY_HEADER;
use crate::tenant::resolve_tenant;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handles `GET /artifacts/{artifact_id}/download`.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(artifact_id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    let now = state.now();
    let Some(artifact_id) = ArtifactId::from_raw(artifact_id) else {
        return ApiError::NotFound.into_response();
    };

    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|value| value.to_str().ok());
    let context = match resolve_tenant(
        state.store.as_ref(),
        &state.config,
        &AuthContext::default(),
        api_key,
        host,
        now,
    ) {
        Ok(Some(context)) => context,
        Ok(None) => return ApiError::Unauthorized.into_response(),
        Err(error) => return ApiError::from(error).into_response(),
    };

    let artifact = match state.store.artifact(context.tenant.id, artifact_id) {
        Ok(Some(artifact)) => artifact,
        Ok(None) => return ApiError::NotFound.into_response(),
        Err(error) => return ApiError::from(error).into_response(),
    };
    if artifact.is_expired(now) {
        return ApiError::Gone.into_response();
    }

    Json(json!({
        "artifact_id": artifact.id.get(),
        "name": artifact.name,
        "location": artifact.storage_path,
        "size_bytes": artifact.size_bytes,
        "checksum_sha256": artifact.checksum_sha256,
        "expires_at": artifact.expires_at.as_unix_millis(),
    }))
    .into_response()
}
