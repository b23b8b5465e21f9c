//! Middleware for the Token Gateway.
//!
//! # Components
//!
//! - `auth` - Authentication middleware for protected routes
//! - `cors` - Pre-flight handling and permissive CORS response headers
//! - `http_metrics` - HTTP metrics for every response

pub mod auth;
pub mod cors;
pub mod http_metrics;

pub use auth::{require_auth, AuthState};
pub use cors::cors_middleware;
pub use http_metrics::http_metrics_middleware;
