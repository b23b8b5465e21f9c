//! JWT utilities shared across Token Gateway crates.
//!
//! This module provides signature-agnostic JWT helpers:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - Structural parsing of the JOSE header (`kid`, `alg`)
//! - iat validation logic
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing parsed here is trusted; the header is only used to select a key
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{parse_token_header, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! // Structural checks and key selection
//! let header = parse_token_header(token)?;
//! let key = key_cache.get(&header.kid).await?;
//!
//! // After signature verification, validate iat
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// - Typical identity provider tokens are 800-1500 bytes (RS256 signature,
///   profile claims)
/// - 8KB allows for large custom claim sets while preventing abuse
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
///
/// Tokens with `iat` (issued-at) timestamps more than this amount in the
/// future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during structural JWT validation.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Header Types
// =============================================================================

/// The untrusted JOSE header fields needed to select a verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Key ID naming the JWKS entry that signed the token.
    pub kid: String,

    /// Algorithm the token claims to use. Informational only: the verifier
    /// pins the algorithm from the key metadata, never from this field.
    pub alg: String,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    kid: Option<serde_json::Value>,
    #[serde(default)]
    alg: Option<String>,
}

// =============================================================================
// Functions
// =============================================================================

/// Parse the JOSE header of a compact JWT without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - The `kid` value should only be used for key lookup in a trusted JWKS
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Not three non-empty segments, bad base64, invalid JSON,
///   or missing `alg`
/// - `MissingKid` - Header has no `kid`, or `kid` is not a non-empty string
pub fn parse_token_header(token: &str) -> Result<TokenHeader, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let alg = header
        .alg
        .filter(|s| !s.is_empty())
        .ok_or(JwtValidationError::MalformedToken)?;

    // Extract kid as string, rejecting empty values
    let kid = header
        .kid
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    Ok(TokenHeader { kid, alg })
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// Rejects tokens with `iat` more than `clock_skew` in the future.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
///
/// Prefer [`validate_iat`] in production code.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds), well within i64 range
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;

    fn token_with_header(header: &str) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        format!("{header_b64}.payload.signature")
    }

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_default_clock_skew_is_5_minutes() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(300));
    }

    // -------------------------------------------------------------------------
    // parse_token_header Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_header_valid_token() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"test-key-01"}"#);

        let header = parse_token_header(&token).unwrap();
        assert_eq!(header.kid, "test-key-01");
        assert_eq!(header.alg, "RS256");
    }

    #[test]
    fn test_parse_header_missing_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT"}"#);

        let result = parse_token_header(&token);
        assert!(matches!(result, Err(JwtValidationError::MissingKid)));
    }

    #[test]
    fn test_parse_header_missing_alg() {
        let token = token_with_header(r#"{"typ":"JWT","kid":"key"}"#);

        let result = parse_token_header(&token);
        assert!(matches!(result, Err(JwtValidationError::MalformedToken)));
    }

    #[test]
    fn test_parse_header_wrong_segment_count() {
        assert!(matches!(
            parse_token_header("not-a-jwt"),
            Err(JwtValidationError::MalformedToken)
        ));
        assert!(matches!(
            parse_token_header("only.two"),
            Err(JwtValidationError::MalformedToken)
        ));
        assert!(matches!(
            parse_token_header("a.b.c.d"),
            Err(JwtValidationError::MalformedToken)
        ));
        assert!(matches!(
            parse_token_header(""),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_parse_header_empty_segment() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","kid":"key"}"#);
        let token = format!("{header_b64}..signature");

        let result = parse_token_header(&token);
        assert!(matches!(result, Err(JwtValidationError::MalformedToken)));
    }

    #[test]
    fn test_parse_header_invalid_base64() {
        let result = parse_token_header("!!!invalid!!!.payload.signature");
        assert!(matches!(result, Err(JwtValidationError::MalformedToken)));
    }

    #[test]
    fn test_parse_header_invalid_json() {
        let token = token_with_header("not-json");

        let result = parse_token_header(&token);
        assert!(matches!(result, Err(JwtValidationError::MalformedToken)));
    }

    #[test]
    fn test_parse_header_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        let result = parse_token_header(&oversized);
        assert!(matches!(result, Err(JwtValidationError::TokenTooLarge)));
    }

    #[test]
    fn test_parse_header_at_size_limit() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT","kid":"key"}"#);
        let remaining = MAX_JWT_SIZE_BYTES - header_b64.len() - 2; // -2 for two dots
        let payload_len = remaining / 2;
        let sig_len = remaining - payload_len;
        let token = format!(
            "{}.{}.{}",
            header_b64,
            "a".repeat(payload_len),
            "b".repeat(sig_len)
        );
        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);

        let header = parse_token_header(&token).expect("token at size limit should be accepted");
        assert_eq!(header.kid, "key");
    }

    #[test]
    fn test_parse_header_non_string_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":12345}"#);

        let result = parse_token_header(&token);
        assert!(matches!(result, Err(JwtValidationError::MissingKid)));
    }

    #[test]
    fn test_parse_header_null_and_empty_kid() {
        let null_kid = token_with_header(r#"{"alg":"RS256","kid":null}"#);
        let empty_kid = token_with_header(r#"{"alg":"RS256","kid":""}"#);

        assert!(matches!(
            parse_token_header(&null_kid),
            Err(JwtValidationError::MissingKid)
        ));
        assert!(matches!(
            parse_token_header(&empty_kid),
            Err(JwtValidationError::MissingKid)
        ));
    }

    // -------------------------------------------------------------------------
    // validate_iat Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_current_time() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_past_time() {
        let past = chrono::Utc::now().timestamp() - 3600;
        assert!(validate_iat(past, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_far_future() {
        let far_future = chrono::Utc::now().timestamp() + 86400;
        let result = validate_iat(far_future, DEFAULT_CLOCK_SKEW);
        assert!(matches!(result, Err(JwtValidationError::IatTooFarInFuture)));
    }

    #[test]
    fn test_validate_iat_at_boundary_exact() {
        let now = 1_700_000_000_i64;

        // iat == now + skew is the last accepted value
        assert!(validate_iat_at(now + 300, DEFAULT_CLOCK_SKEW, now).is_ok());

        assert!(matches!(
            validate_iat_at(now + 301, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::IatTooFarInFuture)
        ));
    }
}
