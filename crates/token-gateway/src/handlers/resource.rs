//! Protected resource handler.
//!
//! Applies the optional `wait` delay and reports who was authenticated.

use crate::auth::TokenClaims;
use crate::models::ResourceResponse;
use crate::observability::metrics::record_wait;
use crate::routes::AppState;
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Handler for GET `/` and GET `/<resource>`.
///
/// Runs only after the auth middleware has verified the request.
///
/// ## Query Parameters
///
/// - `wait`: seconds to delay before responding. Absent, empty, negative or
///   unparseable values mean 0; values above the configured maximum are
///   clamped. Only the first occurrence counts.
///
/// ## Response
///
/// ```json
/// {"status": "ok", "waited": 2, "user": "alice@example.com"}
/// ```
#[instrument(skip_all, name = "gw.handlers.resource")]
pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<TokenClaims>,
    Query(params): Query<Vec<(String, String)>>,
) -> Json<ResourceResponse> {
    let requested = parse_wait(&params);
    let waited = requested.min(state.config.max_wait_seconds);
    let clamped = waited < requested;

    if clamped {
        tracing::debug!(
            target: "gw.handlers.resource",
            requested,
            max = state.config.max_wait_seconds,
            "Requested wait clamped"
        );
    }

    if waited > 0 {
        // Suspends only this request's task
        tokio::time::sleep(Duration::from_secs(waited)).await;
    }
    record_wait(waited, clamped);

    Json(ResourceResponse {
        status: "ok".to_string(),
        waited,
        user: claims.profile_attribute().map(str::to_string),
    })
}

/// Requested delay in seconds from the first `wait` parameter.
///
/// Never fails: anything that is not a non-negative integer is 0.
fn parse_wait(params: &[(String, String)]) -> u64 {
    params
        .iter()
        .find(|(name, _)| name == "wait")
        .and_then(|(_, value)| value.trim().parse::<u64>().ok())
        .unwrap_or(0)
}
