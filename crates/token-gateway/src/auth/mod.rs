//! Authentication module for the Token Gateway.
//!
//! This module handles identity token validation via the provider's JWKS endpoint.
//!
//! # Components
//!
//! - `jwks` - Key Set Cache: fetches and caches the provider's signing keys
//! - `jwt` - Request Authenticator: verifies bearer tokens with cached keys
//! - `claims` - Claims of a verified token

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use claims::TokenClaims;
pub use jwks::JwksClient;
pub use jwt::{AuthResult, JwtValidator};
