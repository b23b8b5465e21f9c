//! Health, readiness and metrics endpoint tests.
//!
//! These endpoints live on the health listener; the main listener treats
//! their paths like any other protected resource.

use anyhow::Result;
use gateway_test_utils::{MockJwksProvider, RsaFixture, TestGatewayServer, TestRsaKey};

#[tokio::test]
async fn test_health_returns_ok() -> Result<()> {
    let provider = MockJwksProvider::start().await;
    let server = TestGatewayServer::spawn(&provider).await?;

    let response = reqwest::get(format!("{}/health", server.health_url())).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

#[tokio::test]
async fn test_readiness_tracks_key_set() -> Result<()> {
    let key = TestRsaKey::new(RsaFixture::A, "key-a");
    let provider = MockJwksProvider::start().await;
    provider.publish(&[&key]).await;
    let server = TestGatewayServer::spawn(&provider).await?;

    let response = reqwest::get(format!("{}/ready", server.health_url())).await?;
    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(
        body,
        serde_json::json!({"status": "not_ready", "jwks": "unavailable"})
    );

    assert_eq!(server.jwks_client().refresh().await?, 1);

    let response = reqwest::get(format!("{}/ready", server.health_url())).await?;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(
        body,
        serde_json::json!({"status": "ready", "jwks": "loaded", "key_count": 1})
    );

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_request_counter() -> Result<()> {
    let provider = MockJwksProvider::start().await;
    let server = TestGatewayServer::spawn(&provider).await?;

    // Traffic on the main listener is what gets counted
    let rejected = reqwest::get(server.url()).await?;
    assert_eq!(rejected.status(), 401);

    let response = reqwest::get(format!("{}/metrics", server.health_url())).await?;
    assert_eq!(response.status(), 200);
    let body = response.text().await?;
    assert!(body.contains("gw_http_requests_total"));
    assert!(body.contains(r#"status_code="401""#));

    Ok(())
}

#[tokio::test]
async fn test_health_rejects_other_methods() -> Result<()> {
    let provider = MockJwksProvider::start().await;
    let server = TestGatewayServer::spawn(&provider).await?;

    let response = reqwest::Client::new()
        .post(format!("{}/health", server.health_url()))
        .send()
        .await?;

    assert_eq!(response.status(), 405);

    Ok(())
}

#[tokio::test]
async fn test_operational_paths_require_token_on_main_listener() -> Result<()> {
    let provider = MockJwksProvider::start().await;
    let server = TestGatewayServer::spawn(&provider).await?;

    for path in ["/health", "/ready", "/metrics"] {
        let response = reqwest::get(format!("{}{}", server.url(), path)).await?;
        assert_eq!(response.status(), 401, "path: {path}");
    }

    // Nothing was scraped, so no key fetch either
    assert_eq!(provider.request_count().await, 0);

    Ok(())
}
