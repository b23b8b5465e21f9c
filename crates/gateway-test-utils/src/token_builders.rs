//! Builder patterns for test token construction
//!
//! Provides a fluent API for identity-token claims. Defaults describe a valid
//! Cognito-style ID token for [`TEST_CLIENT_ID`] issued by [`TEST_ISSUER`];
//! [`TestTokenBuilder::access_token`] starts from a Cognito access token.

use crate::crypto_fixtures::TestRsaKey;
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Audience every test gateway is configured to accept.
pub const TEST_CLIENT_ID: &str = "test-client-id";

/// Issuer every test gateway is configured to accept.
pub const TEST_ISSUER: &str = "https://idp.test.example/pool";

/// Builder for creating test token claims
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .email("alice@example.com")
///     .expires_in(600)
///     .sign_with(&key);
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    sub: String,
    email: Option<String>,
    username: Option<String>,
    aud: Option<Value>,
    client_id: Option<String>,
    iss: Option<String>,
    exp: i64,
    iat: Option<i64>,
    token_use: Option<String>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-subject".to_string(),
            email: Some("test-user@example.com".to_string()),
            username: None,
            aud: Some(json!(TEST_CLIENT_ID)),
            client_id: None,
            iss: Some(TEST_ISSUER.to_string()),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: Some(now.timestamp()),
            token_use: Some("id".to_string()),
        }
    }

    /// Start from a valid access token: no `aud` or email, the client is named
    /// in `client_id`.
    pub fn access_token() -> Self {
        Self {
            email: None,
            aud: None,
            client_id: Some(TEST_CLIENT_ID.to_string()),
            token_use: Some("access".to_string()),
            ..Self::new()
        }
    }

    /// Set the subject
    pub fn sub(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Set the email profile attribute
    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Drop the email profile attribute
    pub fn without_email(mut self) -> Self {
        self.email = None;
        self
    }

    /// Set the username (`cognito:username` on ID tokens, `username` on
    /// access tokens)
    pub fn username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    /// Set a single audience
    pub fn aud(mut self, aud: &str) -> Self {
        self.aud = Some(json!(aud));
        self
    }

    /// Set a list of audiences
    pub fn aud_list(mut self, auds: &[&str]) -> Self {
        self.aud = Some(json!(auds));
        self
    }

    /// Drop the audience claim
    pub fn without_aud(mut self) -> Self {
        self.aud = None;
        self
    }

    /// Set the `client_id` claim
    pub fn client_id(mut self, client_id: &str) -> Self {
        self.client_id = Some(client_id.to_string());
        self
    }

    /// Set the issuer
    pub fn iss(mut self, iss: &str) -> Self {
        self.iss = Some(iss.to_string());
        self
    }

    /// Set expiration in seconds from now (negative for the past)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Expired one minute ago
    pub fn expired(self) -> Self {
        self.expires_in(-60)
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = Some(timestamp);
        self
    }

    /// Set the `token_use` claim
    pub fn token_use(mut self, token_use: &str) -> Self {
        self.token_use = Some(token_use.to_string());
        self
    }

    /// Build the claims as a JSON value
    pub fn build_claims(&self) -> Value {
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!(self.sub));
        claims.insert("exp".to_string(), json!(self.exp));

        if let Some(email) = &self.email {
            claims.insert("email".to_string(), json!(email));
        }
        if let Some(username) = &self.username {
            let name = if self.token_use.as_deref() == Some("access") {
                "username"
            } else {
                "cognito:username"
            };
            claims.insert(name.to_string(), json!(username));
        }
        if let Some(aud) = &self.aud {
            claims.insert("aud".to_string(), aud.clone());
        }
        if let Some(client_id) = &self.client_id {
            claims.insert("client_id".to_string(), json!(client_id));
        }
        if let Some(iss) = &self.iss {
            claims.insert("iss".to_string(), json!(iss));
        }
        if let Some(iat) = self.iat {
            claims.insert("iat".to_string(), json!(iat));
        }
        if let Some(token_use) = &self.token_use {
            claims.insert("token_use".to_string(), json!(token_use));
        }

        Value::Object(claims)
    }

    /// Build the claims and sign them with `key`
    pub fn sign_with(&self, key: &TestRsaKey) -> String {
        key.sign(&self.build_claims())
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid_for_test_gateway() {
        let claims = TestTokenBuilder::new().build_claims();

        assert_eq!(claims["aud"], TEST_CLIENT_ID);
        assert_eq!(claims["iss"], TEST_ISSUER);
        assert_eq!(claims["token_use"], "id");
        assert!(claims["exp"].as_i64().unwrap() > Utc::now().timestamp());
    }

    #[test]
    fn test_optional_claims_are_omitted() {
        let claims = TestTokenBuilder::new()
            .without_email()
            .without_aud()
            .build_claims();

        assert!(claims.get("email").is_none());
        assert!(claims.get("aud").is_none());
    }

    #[test]
    fn test_access_token_shape() {
        let claims = TestTokenBuilder::access_token()
            .username("alice")
            .build_claims();

        assert!(claims.get("aud").is_none());
        assert!(claims.get("email").is_none());
        assert_eq!(claims["client_id"], TEST_CLIENT_ID);
        assert_eq!(claims["token_use"], "access");
        assert_eq!(claims["username"], "alice");
        assert!(claims.get("cognito:username").is_none());
    }

    #[test]
    fn test_expired() {
        let claims = TestTokenBuilder::new().expired().build_claims();
        assert!(claims["exp"].as_i64().unwrap() < Utc::now().timestamp());
    }

    #[test]
    fn test_username_uses_cognito_claim_name() {
        let claims = TestTokenBuilder::new().username("alice").build_claims();
        assert_eq!(claims["cognito:username"], "alice");
    }
}
