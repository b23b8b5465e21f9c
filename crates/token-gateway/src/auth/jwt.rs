//! JWT validation for the Token Gateway.
//!
//! Validates incoming identity tokens using public keys fetched from the
//! identity provider's JWKS endpoint.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Structural checks run before any signature computation
//! - The algorithm is pinned by the key, never taken from the token header
//! - Claims are only trusted after the signature verifies
//! - Rejection reasons are logged and counted, never returned to the caller

use crate::auth::claims::TokenClaims;
use crate::auth::jwks::{JwksClient, SigningKey};
use crate::config::Config;
use crate::errors::{AuthRejection, ClaimError};
use crate::observability::metrics::record_auth_attempt;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use common::jwt::{parse_token_header, validate_iat};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, Validation};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Outcome of authenticating one request.
pub type AuthResult = Result<TokenClaims, AuthRejection>;

/// Accepted values of the Cognito `token_use` claim.
const ACCEPTED_TOKEN_USES: [&str; 2] = ["id", "access"];

/// JWT validator using the provider's JWKS.
pub struct JwtValidator {
    /// JWKS client for fetching public keys.
    jwks_client: Arc<JwksClient>,

    /// Expected `aud`.
    client_id: String,

    /// Expected `iss`.
    issuer: String,

    /// Clock skew tolerance for iat validation.
    clock_skew: Duration,
}

impl JwtValidator {
    /// Create a new JWT validator.
    ///
    /// # Arguments
    ///
    /// * `jwks_client` - Client for fetching public keys
    /// * `client_id` - Audience the token must be issued for
    /// * `issuer` - Issuer the token must come from
    /// * `clock_skew_seconds` - Clock skew tolerance for iat validation
    pub fn new(
        jwks_client: Arc<JwksClient>,
        client_id: String,
        issuer: String,
        clock_skew_seconds: i64,
    ) -> Self {
        Self {
            jwks_client,
            client_id,
            issuer,
            clock_skew: Duration::from_secs(clock_skew_seconds.unsigned_abs()),
        }
    }

    /// Create a validator for the configured client and issuer.
    pub fn from_config(jwks_client: Arc<JwksClient>, config: &Config) -> Self {
        Self::new(
            jwks_client,
            config.client_id.clone(),
            config.issuer.clone(),
            config.jwt_clock_skew_seconds,
        )
    }

    /// Classify a request as authenticated or rejected from its headers.
    ///
    /// Every outcome is counted; the rejection reason is logged at debug level.
    #[instrument(skip_all, name = "gw.auth.authenticate")]
    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthResult {
        let start = Instant::now();

        let result = match extract_bearer_token(headers) {
            Some(token) => self.validate(token).await,
            None => Err(AuthRejection::MissingToken),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(rejection) => {
                tracing::debug!(target: "gw.auth.jwt", reason = %rejection, "Request rejected");
                rejection.as_label()
            }
        };
        record_auth_attempt(outcome, start.elapsed());

        result
    }

    /// Validate a raw token and return its claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check and header parse (kid, alg) - no other field trusted
    /// 2. Key lookup by kid
    /// 3. Signature verification with the key's pinned algorithm
    /// 4. Claim validation (exp, aud, iss, iat, token_use)
    ///
    /// # Errors
    ///
    /// Returns the first `AuthRejection` hit, in the order above.
    pub async fn validate(&self, token: &str) -> AuthResult {
        // 1. Structural checks (includes size check via common::jwt)
        let header = parse_token_header(token).map_err(|e| {
            tracing::debug!(target: "gw.auth.jwt", error = ?e, "Token header parse failed");
            AuthRejection::MalformedToken
        })?;

        // 2. Fetch public key from JWKS
        let key = self.jwks_client.get_key(&header.kid).await.map_err(|e| {
            tracing::debug!(target: "gw.auth.jwt", kid = %header.kid, error = %e, "Signing key lookup failed");
            AuthRejection::UnknownKey
        })?;

        // 3. Verify signature and extract claims
        let claims = verify_token(token, &header.alg, &key)?;

        // 4. Validate claims
        self.validate_claims(&claims, chrono::Utc::now().timestamp())
            .map_err(|e| {
                tracing::debug!(target: "gw.auth.jwt", reason = %e, "Token claim validation failed");
                AuthRejection::ClaimValidationFailed(e)
            })?;

        tracing::debug!(target: "gw.auth.jwt", kid = %key.kid(), "Token validated successfully");
        Ok(claims)
    }

    /// Check verified claims against this validator's expectations at `now`.
    fn validate_claims(&self, claims: &TokenClaims, now: i64) -> Result<(), ClaimError> {
        if claims.exp <= now {
            return Err(ClaimError::Expired);
        }

        if !self.issued_for_client(claims) {
            return Err(ClaimError::AudienceMismatch);
        }

        if claims.iss.as_deref() != Some(self.issuer.as_str()) {
            return Err(ClaimError::IssuerMismatch);
        }

        if let Some(iat) = claims.iat {
            validate_iat(iat, self.clock_skew).map_err(|_| ClaimError::IssuedInFuture)?;
        }

        if let Some(token_use) = claims.token_use.as_deref() {
            if !ACCEPTED_TOKEN_USES.contains(&token_use) {
                return Err(ClaimError::UnsupportedTokenUse);
            }
        }

        Ok(())
    }

    /// Whether the token was issued for the configured client.
    ///
    /// Cognito access tokens have no `aud`; they name the client in
    /// `client_id` instead. Every other token must list the client in `aud`.
    fn issued_for_client(&self, claims: &TokenClaims) -> bool {
        match claims.token_use.as_deref() {
            Some("access") => claims.client_id.as_deref() == Some(self.client_id.as_str()),
            _ => claims
                .aud
                .as_ref()
                .is_some_and(|aud| aud.contains(&self.client_id)),
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// Returns `None` for an absent or non-UTF-8 header, any other scheme, or an
/// empty token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    Some(token)
}

/// Verify JWT signature and extract claims.
///
/// The algorithm comes from the key. A token whose header declares a different
/// algorithm (`declared_alg`) is rejected before any verification.
fn verify_token(
    token: &str,
    declared_alg: &str,
    key: &SigningKey,
) -> Result<TokenClaims, AuthRejection> {
    if declared_alg.parse::<Algorithm>().ok() != Some(key.algorithm()) {
        tracing::warn!(
            target: "gw.auth.jwt",
            kid = %key.kid(),
            token_alg = %declared_alg,
            key_alg = ?key.algorithm(),
            "Token algorithm does not match key algorithm"
        );
        return Err(AuthRejection::InvalidSignature);
    }

    // Signature only; claims are checked by validate_claims
    let mut validation = Validation::new(key.algorithm());
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data =
        decode::<TokenClaims>(token, key.decoding_key(), &validation).map_err(|e| {
            match e.kind() {
                // Signature already verified; the payload itself is bad
                ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                    tracing::debug!(target: "gw.auth.jwt", error = %e, "Token claims could not be decoded");
                    AuthRejection::ClaimValidationFailed(ClaimError::Malformed)
                }
                _ => {
                    tracing::debug!(target: "gw.auth.jwt", error = %e, "Token verification failed");
                    AuthRejection::InvalidSignature
                }
            }
        })?;

    Ok(token_data.claims)
}
