//! Delay (`?wait=`) integration tests.
//!
//! Waits are real sleeps, so values stay small.

use anyhow::Result;
use gateway_test_utils::{
    test_config, MockJwksProvider, RsaFixture, TestGatewayServer, TestRsaKey, TestTokenBuilder,
};
use std::time::{Duration, Instant};
use token_gateway::models::ResourceResponse;

async fn get_resource(
    client: &reqwest::Client,
    server: &TestGatewayServer,
    path_and_query: &str,
    token: &str,
) -> Result<(ResourceResponse, Duration)> {
    let start = Instant::now();
    let response = client
        .get(format!("{}{}", server.url(), path_and_query))
        .bearer_auth(token)
        .send()
        .await?;
    assert_eq!(response.status(), 200, "path: {path_and_query}");
    let body: ResourceResponse = response.json().await?;
    Ok((body, start.elapsed()))
}

#[tokio::test]
async fn test_absent_zero_and_invalid_wait_respond_immediately() -> Result<()> {
    let key = TestRsaKey::new(RsaFixture::A, "key-a");
    let provider = MockJwksProvider::start().await;
    provider.publish(&[&key]).await;
    let server = TestGatewayServer::spawn(&provider).await?;
    let client = reqwest::Client::new();
    let token = TestTokenBuilder::new().sign_with(&key);

    for path in [
        "/",
        "/items?wait=0",
        "/items?wait=",
        "/items?wait=abc",
        "/items?wait=-5",
        "/items?wait=1.5",
    ] {
        let (body, elapsed) = get_resource(&client, &server, path, &token).await?;
        assert_eq!(body.waited, 0, "path: {path}");
        assert!(elapsed < Duration::from_secs(1), "path: {path}");
    }

    Ok(())
}

#[tokio::test]
async fn test_wait_delays_response() -> Result<()> {
    let key = TestRsaKey::new(RsaFixture::A, "key-a");
    let provider = MockJwksProvider::start().await;
    provider.publish(&[&key]).await;
    let server = TestGatewayServer::spawn(&provider).await?;
    let client = reqwest::Client::new();
    let token = TestTokenBuilder::new().sign_with(&key);

    let (body, elapsed) = get_resource(&client, &server, "/slow?wait=2", &token).await?;

    assert_eq!(body.waited, 2);
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(5));

    Ok(())
}

#[tokio::test]
async fn test_wait_is_clamped_to_configured_maximum() -> Result<()> {
    let key = TestRsaKey::new(RsaFixture::A, "key-a");
    let provider = MockJwksProvider::start().await;
    provider.publish(&[&key]).await;

    let mut vars = test_config(&provider.jwks_url());
    vars.insert("MAX_WAIT_SECONDS".to_string(), "1".to_string());
    let server = TestGatewayServer::spawn_with_vars(vars).await?;
    let client = reqwest::Client::new();
    let token = TestTokenBuilder::new().sign_with(&key);

    let (body, elapsed) = get_resource(&client, &server, "/?wait=3600", &token).await?;

    assert_eq!(server.config().max_wait_seconds, 1);
    assert_eq!(body.waited, 1);
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(3));

    Ok(())
}

#[tokio::test]
async fn test_waiting_request_does_not_block_others() -> Result<()> {
    let key = TestRsaKey::new(RsaFixture::A, "key-a");
    let provider = MockJwksProvider::start().await;
    provider.publish(&[&key]).await;
    let server = TestGatewayServer::spawn(&provider).await?;
    let client = reqwest::Client::new();
    let token = TestTokenBuilder::new().sign_with(&key);

    // Warm the key cache so neither request pays for the cold-start fetch
    get_resource(&client, &server, "/", &token).await?;

    let (slow, fast) = tokio::join!(
        get_resource(&client, &server, "/slow?wait=3", &token),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            get_resource(&client, &server, "/fast", &token).await
        }
    );
    let (slow_body, slow_elapsed) = slow?;
    let (fast_body, fast_elapsed) = fast?;

    assert_eq!(slow_body.waited, 3);
    assert!(slow_elapsed >= Duration::from_secs(3));
    assert_eq!(fast_body.waited, 0);
    assert!(fast_elapsed < Duration::from_secs(1));

    Ok(())
}
