//! HTTP routes for the Token Gateway.
//!
//! Defines the Axum router and application state.

use crate::auth::{JwksClient, JwtValidator};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{cors_middleware, http_metrics_middleware, require_auth, AuthState};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Key Set Cache, shared with the background refresher.
    pub jwks_client: Arc<JwksClient>,
}

/// Build the application routes served on the main listener.
///
/// Creates an Axum router with:
/// - `/` and `/<resource>` - Protected resource with optional `wait` delay
/// - `OPTIONS` on any path - CORS pre-flight, answered before routing
/// - TraceLayer for request logging
/// - Request timeout of the maximum wait plus a fixed margin
///
/// Every GET on this router requires a token. Health checks and metrics live on
/// [`build_health_routes`].
pub fn build_routes(state: Arc<AppState>) -> Router {
    let jwt_validator = Arc::new(JwtValidator::from_config(
        Arc::clone(&state.jwks_client),
        &state.config,
    ));
    let auth_state = Arc::new(AuthState { jwt_validator });
    let request_timeout = state.config.request_timeout();

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/", get(handlers::get_resource))
        .route("/*resource", get(handlers::get_resource))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TraceLayer - Log request details (innermost)
    // 2. TimeoutLayer - Bound the whole request, wait included
    // 3. cors_middleware - Pre-flight short-circuit, allow-origin on every response
    // 4. http_metrics_middleware - Record ALL responses (outermost)
    protected_routes
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(cors_middleware))
        .layer(middleware::from_fn(http_metrics_middleware))
}

/// Build the health and metrics routes served on the separate health listener.
///
/// - `/health` - Liveness check (simple "OK")
/// - `/ready` - Readiness check (JWKS snapshot loaded)
/// - `/metrics` - Prometheus metrics endpoint
pub fn build_health_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state);

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    health_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
}
