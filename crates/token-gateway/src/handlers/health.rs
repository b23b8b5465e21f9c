//! Health check handlers.
//!
//! - `/health`: Liveness check - returns OK if the process is running
//! - `/ready`: Readiness check - checks that a JWKS snapshot is loaded

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness check handler.
///
/// Does NOT check any dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check handler.
///
/// Returns 200 once a key set has been loaded, 503 before that. A snapshot
/// that has gone stale still counts as loaded: tokens are verified against it
/// while the refresh is retried.
#[tracing::instrument(skip_all, name = "gw.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.jwks_client.snapshot() {
        Some(snapshot) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                jwks: "loaded",
                key_count: Some(snapshot.len()),
            }),
        ),
        None => {
            tracing::warn!(target: "gw.health", "Readiness check failed: no JWKS snapshot loaded");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    jwks: "unavailable",
                    key_count: None,
                }),
            )
        }
    }
}
