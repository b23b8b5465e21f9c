//! # Gateway Test Utilities
//!
//! Shared test utilities for the Token Gateway.
//!
//! This crate provides:
//! - Fixed RSA keys and JWK rendering (`TestRsaKey`)
//! - Token claim builders (`TestTokenBuilder`)
//! - A mock identity-provider JWKS endpoint (`MockJwksProvider`)
//! - Server test harness (`TestGatewayServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let key = TestRsaKey::new(RsaFixture::A, "key-a");
//!     let provider = MockJwksProvider::start().await;
//!     provider.publish(&[&key]).await;
//!     let server = TestGatewayServer::spawn(&provider).await?;
//!
//!     let token = TestTokenBuilder::new().sign_with(&key);
//!     let response = reqwest::Client::new()
//!         .get(server.url())
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_mock;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_mock::*;
pub use server_harness::*;
pub use token_builders::*;
