//! Background tasks for the Token Gateway.
//!
//! # Tasks
//!
//! - `jwks_refresher` - Keeps the JWKS snapshot within its TTL

pub mod jwks_refresher;

pub use jwks_refresher::start_jwks_refresher;
