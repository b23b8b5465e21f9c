//! JWKS refresher background task.
//!
//! Periodically checks the age of the JWKS snapshot and refreshes it once it
//! passes the cache TTL. Failed refreshes keep the previous snapshot and are
//! retried on the next check.
//!
//! # Graceful Shutdown
//!
//! The task supports graceful shutdown via a cancellation token. When the token
//! is cancelled, the task exits after the current iteration.

use crate::auth::JwksClient;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Upper bound on the check interval in seconds.
const MAX_CHECK_INTERVAL_SECONDS: u64 = 15;

/// How often to check the snapshot age: every 15 seconds, or every TTL when
/// that is shorter.
pub fn check_interval(cache_ttl: Duration) -> Duration {
    cache_ttl.min(Duration::from_secs(MAX_CHECK_INTERVAL_SECONDS))
}

/// Start the JWKS refresher background task.
///
/// # Arguments
///
/// * `jwks_client` - Key Set Cache to keep fresh
/// * `cache_ttl` - Snapshot TTL
/// * `cancel_token` - Token for graceful shutdown
///
/// # Returns
///
/// Returns when the cancellation token is triggered.
#[instrument(skip_all, name = "gw.task.jwks_refresher")]
pub async fn start_jwks_refresher(
    jwks_client: Arc<JwksClient>,
    cache_ttl: Duration,
    cancel_token: CancellationToken,
) {
    let period = check_interval(cache_ttl);

    info!(
        target: "gw.task.jwks_refresher",
        cache_ttl_secs = cache_ttl.as_secs(),
        check_interval_ms = period.as_millis() as u64,
        "Starting JWKS refresher task"
    );

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if !jwks_client.is_stale() {
                    continue;
                }

                match jwks_client.refresh().await {
                    Ok(key_count) => {
                        tracing::debug!(
                            target: "gw.task.jwks_refresher",
                            key_count,
                            "Scheduled JWKS refresh complete"
                        );
                    }
                    Err(e) => {
                        // Stale snapshot stays in service; retry next tick
                        warn!(
                            target: "gw.task.jwks_refresher",
                            error = %e,
                            "Scheduled JWKS refresh failed"
                        );
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "gw.task.jwks_refresher",
                    "JWKS refresher task received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "gw.task.jwks_refresher", "JWKS refresher task stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::JwksClientConfig;
    use gateway_test_utils::{MockJwksProvider, RsaFixture, TestRsaKey};

    #[test]
    fn test_check_interval() {
        assert_eq!(
            check_interval(Duration::from_secs(300)),
            Duration::from_secs(15)
        );
        assert_eq!(
            check_interval(Duration::from_secs(2)),
            Duration::from_secs(2)
        );
    }

    #[tokio::test]
    async fn test_cancellation_token_stops_task() {
        let jwks_client = Arc::new(JwksClient::new(
            "http://127.0.0.1:9/.well-known/jwks.json".to_string(),
        ));
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();

        tokio::time::timeout(
            Duration::from_secs(5),
            start_jwks_refresher(jwks_client, Duration::from_secs(300), cancel_token),
        )
        .await
        .expect("refresher should exit once cancelled");
    }

    #[tokio::test]
    async fn test_refresher_loads_and_rotates_keys() {
        let key_a = TestRsaKey::new(RsaFixture::A, "key-a");
        let key_b = TestRsaKey::new(RsaFixture::B, "key-b");
        let provider = MockJwksProvider::start().await;
        provider.publish(&[&key_a]).await;

        let ttl = Duration::from_millis(200);
        let jwks_client = Arc::new(JwksClient::with_config(
            provider.jwks_url(),
            JwksClientConfig {
                cache_ttl: ttl,
                ..JwksClientConfig::default()
            },
        ));
        let cancel_token = CancellationToken::new();
        let task = tokio::spawn(start_jwks_refresher(
            Arc::clone(&jwks_client),
            ttl,
            cancel_token.clone(),
        ));

        // First tick fires immediately and loads the empty cache
        let mut loaded = false;
        for _ in 0..50 {
            if jwks_client.snapshot().is_some_and(|s| s.get("key-a").is_some()) {
                loaded = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(loaded, "refresher should perform the initial load");

        provider.publish(&[&key_b]).await;

        let mut rotated = false;
        for _ in 0..100 {
            if jwks_client.snapshot().is_some_and(|s| s.get("key-b").is_some()) {
                rotated = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(rotated, "refresher should pick up the rotated key set");

        cancel_token.cancel();
        task.await.unwrap();
    }
}
