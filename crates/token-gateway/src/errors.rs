//! Token Gateway error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Error messages returned to clients are intentionally generic so that a
//! caller can never learn why a token was rejected. Actual errors are logged
//! server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Why a syntactically valid, correctly signed token failed claim validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("token has expired")]
    Expired,

    #[error("audience does not match the configured client id")]
    AudienceMismatch,

    #[error("issuer does not match the configured issuer")]
    IssuerMismatch,

    #[error("issued-at is too far in the future")]
    IssuedInFuture,

    #[error("unsupported token_use")]
    UnsupportedTokenUse,

    #[error("claims could not be decoded")]
    Malformed,
}

/// Why a request was not authenticated.
///
/// Every variant collapses to the same 401 response; the variant itself is
/// only ever logged and counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthRejection {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed token")]
    MalformedToken,

    #[error("unknown signing key")]
    UnknownKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("claim validation failed: {0}")]
    ClaimValidationFailed(ClaimError),
}

impl AuthRejection {
    /// Bounded label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AuthRejection::MissingToken => "missing_token",
            AuthRejection::MalformedToken => "malformed_token",
            AuthRejection::UnknownKey => "unknown_key",
            AuthRejection::InvalidSignature => "invalid_signature",
            AuthRejection::ClaimValidationFailed(_) => "claim_validation_failed",
        }
    }
}

/// Token Gateway error type.
///
/// Maps to appropriate HTTP status codes:
/// - Unauthorized: 401 Unauthorized
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthRejection),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GatewayError::Unauthorized(rejection) => {
                // Detail stays server-side
                tracing::debug!(target: "gw.errors", reason = %rejection, "Request unauthorized");
                (StatusCode::UNAUTHORIZED, "Unauthorized")
            }
        };

        let mut response = (status, Json(ErrorResponse { error: message })).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"token-gateway\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_rejections() {
        assert_eq!(
            format!("{}", AuthRejection::MissingToken),
            "missing bearer token"
        );
        assert_eq!(
            format!(
                "{}",
                AuthRejection::ClaimValidationFailed(ClaimError::AudienceMismatch)
            ),
            "claim validation failed: audience does not match the configured client id"
        );
    }

    #[test]
    fn test_rejection_labels_are_bounded() {
        let labels = [
            AuthRejection::MissingToken.as_label(),
            AuthRejection::MalformedToken.as_label(),
            AuthRejection::UnknownKey.as_label(),
            AuthRejection::InvalidSignature.as_label(),
        ];
        assert!(labels.iter().all(|l| !l.contains(' ')));

        // Claim sub-reasons share one label
        assert_eq!(
            AuthRejection::ClaimValidationFailed(ClaimError::Expired).as_label(),
            AuthRejection::ClaimValidationFailed(ClaimError::IssuerMismatch).as_label()
        );
    }

    #[tokio::test]
    async fn test_into_response_unauthorized_is_generic() {
        let error = GatewayError::Unauthorized(AuthRejection::ClaimValidationFailed(
            ClaimError::Expired,
        ));
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response
            .headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.contains("Bearer realm=\"token-gateway\""));

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json, serde_json::json!({"error": "Unauthorized"}));
    }

    #[tokio::test]
    async fn test_every_rejection_renders_identically() {
        let rejections = [
            AuthRejection::MissingToken,
            AuthRejection::MalformedToken,
            AuthRejection::UnknownKey,
            AuthRejection::InvalidSignature,
            AuthRejection::ClaimValidationFailed(ClaimError::AudienceMismatch),
        ];

        for rejection in rejections {
            let response = GatewayError::from(rejection).into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body_json = read_body_json(response.into_body()).await;
            assert_eq!(body_json, serde_json::json!({"error": "Unauthorized"}));
        }
    }
}
