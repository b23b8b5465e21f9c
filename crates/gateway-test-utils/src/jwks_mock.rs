//! Mock identity provider JWKS endpoint
//!
//! Wraps a wiremock server that serves `/.well-known/jwks.json`. Publishing
//! replaces whatever the provider served before (and clears the request log),
//! which is how tests model key rotation and provider outages.

use crate::crypto_fixtures::TestRsaKey;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock serves the key set on.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A running mock JWKS provider.
///
/// # Example
/// ```rust,ignore
/// let provider = MockJwksProvider::start().await;
/// provider.publish(&[&key]).await;
/// let client = JwksClient::new(provider.jwks_url());
/// ```
pub struct MockJwksProvider {
    server: MockServer,
}

impl MockJwksProvider {
    /// Start a provider that serves nothing until a key set is published.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Full JWKS URL.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Serve exactly `keys`.
    pub async fn publish(&self, keys: &[&TestRsaKey]) {
        self.publish_raw(key_set(keys)).await;
    }

    /// Serve `keys` after `delay`.
    pub async fn publish_with_delay(&self, keys: &[&TestRsaKey], delay: Duration) {
        self.replace_with(
            ResponseTemplate::new(200)
                .set_body_json(key_set(keys))
                .set_delay(delay),
        )
        .await;
    }

    /// Serve an arbitrary JSON body.
    pub async fn publish_raw(&self, body: Value) {
        self.replace_with(ResponseTemplate::new(200).set_body_json(body))
            .await;
    }

    /// Answer every JWKS request with `status` and no key set.
    pub async fn fail_with(&self, status: u16) {
        self.replace_with(ResponseTemplate::new(status)).await;
    }

    /// Number of JWKS requests received since the last publish.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    async fn replace_with(&self, response: ResponseTemplate) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }
}

fn key_set(keys: &[&TestRsaKey]) -> Value {
    json!({ "keys": keys.iter().map(|key| key.jwk()).collect::<Vec<_>>() })
}
