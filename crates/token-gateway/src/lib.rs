//! Token Gateway Library
//!
//! A small HTTP backend that verifies identity-provider tokens before serving
//! a protected resource:
//!
//! - Key Set Cache: provider signing keys, fetched from the JWKS endpoint and
//!   refreshed without restarts
//! - Request Authenticator: bearer token extraction, signature and claim checks
//! - Request Handler: CORS pre-flight, optional `wait` delay, JSON responses
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/jwt.rs -> auth/jwks.rs
//!               -> handlers/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Key Set Cache and Request Authenticator
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Auth, CORS and HTTP metrics layers
//! - `models` - Response bodies
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `tasks` - Background JWKS refresh

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod tasks;
