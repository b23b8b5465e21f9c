//! Authentication middleware for protected routes.
//!
//! Runs the Request Authenticator over the request headers and injects the
//! verified claims into request extensions.

use crate::auth::JwtValidator;
use crate::errors::GatewayError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// JWT validator with JWKS client.
    pub jwt_validator: Arc<JwtValidator>,
}

/// Authentication middleware that validates bearer tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - Returns 401 Unauthorized with WWW-Authenticate header if the token is
///   missing or invalid; the handler never runs
/// - Continues to next handler with claims in extensions if token is valid
#[instrument(skip(state, req, next), name = "gw.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GatewayError> {
    let claims = state.jwt_validator.authenticate(req.headers()).await?;

    // Store claims in request extensions for downstream handlers
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
