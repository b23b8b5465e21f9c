//! JWT claims structure.
//!
//! Contains the claims extracted from verified identity tokens. The `sub` and
//! `email` fields are redacted in Debug output to prevent exposure in logs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The `aud` claim: a single audience or a list of audiences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `client_id` is (one of) the token's audience(s).
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == client_id,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

/// Claims of a verified identity token.
///
/// Only ever constructed from a payload whose signature has already been
/// verified.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (stable user identifier) - redacted in Debug output.
    pub sub: String,

    /// Email profile attribute - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Username as issued by a Cognito user pool. ID tokens carry it as
    /// `cognito:username`, access tokens as `username`.
    #[serde(
        default,
        rename = "cognito:username",
        alias = "username",
        skip_serializing_if = "Option::is_none"
    )]
    pub username: Option<String>,

    /// Audience (client identifier the token was issued for). ID tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Client identifier the token was issued for. Access tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Cognito token type ("id" or "access").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,
}

impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("sub", &"[REDACTED]")
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("username", &self.username.as_ref().map(|_| "[REDACTED]"))
            .field("aud", &self.aud)
            .field("client_id", &self.client_id)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("iss", &self.iss)
            .field("token_use", &self.token_use)
            .finish()
    }
}

impl TokenClaims {
    /// The profile attribute reported back to the caller.
    ///
    /// Email when present, otherwise the user pool username.
    pub fn profile_attribute(&self) -> Option<&str> {
        self.email.as_deref().or(self.username.as_deref())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_claims() -> TokenClaims {
        TokenClaims {
            sub: "secret-user-id".to_string(),
            email: Some("alice@example.com".to_string()),
            username: Some("alice".to_string()),
            aud: Some(Audience::Single("demo-client".to_string())),
            client_id: None,
            exp: 1_234_567_890,
            iat: Some(1_234_567_800),
            iss: Some("https://idp.example.com".to_string()),
            token_use: Some("id".to_string()),
        }
    }

    #[test]
    fn test_claims_debug_redacts_identity() {
        let debug_str = format!("{:?}", sample_claims());

        assert!(!debug_str.contains("secret-user-id"));
        assert!(!debug_str.contains("alice@example.com"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("demo-client"));
    }

    #[test]
    fn test_profile_attribute_prefers_email() {
        let mut claims = sample_claims();
        assert_eq!(claims.profile_attribute(), Some("alice@example.com"));

        claims.email = None;
        assert_eq!(claims.profile_attribute(), Some("alice"));

        claims.username = None;
        assert_eq!(claims.profile_attribute(), None);
    }

    #[test]
    fn test_audience_single_and_multiple() {
        let single: Audience = serde_json::from_str(r#""demo-client""#).unwrap();
        assert!(single.contains("demo-client"));
        assert!(!single.contains("other-client"));

        let multiple: Audience = serde_json::from_str(r#"["a", "demo-client"]"#).unwrap();
        assert!(multiple.contains("demo-client"));
        assert!(!multiple.contains("demo"));
    }

    #[test]
    fn test_claims_deserialize_cognito_id_token() {
        let json = r#"{
            "sub": "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee",
            "email_verified": true,
            "iss": "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_example",
            "cognito:username": "alice",
            "aud": "demo-client",
            "token_use": "id",
            "auth_time": 1700000000,
            "exp": 1700003600,
            "iat": 1700000000,
            "email": "alice@example.com"
        }"#;

        let claims: TokenClaims = serde_json::from_str(json).unwrap();

        assert_eq!(claims.username.as_deref(), Some("alice"));
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert_eq!(claims.token_use.as_deref(), Some("id"));
        assert_eq!(claims.exp, 1_700_003_600);
        assert!(claims.aud.unwrap().contains("demo-client"));
    }

    #[test]
    fn test_claims_deserialize_cognito_access_token() {
        let json = r#"{
            "sub": "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee",
            "iss": "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_example",
            "client_id": "demo-client",
            "origin_jti": "11111111-2222-3333-4444-555555555555",
            "token_use": "access",
            "scope": "openid email",
            "auth_time": 1700000000,
            "exp": 1700003600,
            "iat": 1700000000,
            "jti": "66666666-7777-8888-9999-000000000000",
            "username": "alice"
        }"#;

        let claims: TokenClaims = serde_json::from_str(json).unwrap();

        assert!(claims.aud.is_none());
        assert_eq!(claims.client_id.as_deref(), Some("demo-client"));
        assert_eq!(claims.token_use.as_deref(), Some("access"));
        assert_eq!(claims.profile_attribute(), Some("alice"));
    }

    #[test]
    fn test_claims_minimal() {
        let claims: TokenClaims = serde_json::from_str(r#"{"sub":"u","exp":1}"#).unwrap();

        assert!(claims.aud.is_none());
        assert!(claims.iat.is_none());
        assert!(claims.profile_attribute().is_none());
    }

    #[test]
    fn test_claims_missing_exp_is_rejected() {
        let result = serde_json::from_str::<TokenClaims>(r#"{"sub":"u"}"#);
        assert!(result.is_err());
    }
}
