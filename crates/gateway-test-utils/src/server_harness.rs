//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer` for spawning real gateway instances in tests.

use crate::jwks_mock::MockJwksProvider;
use crate::token_builders::{TEST_CLIENT_ID, TEST_ISSUER};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use token_gateway::auth::JwksClient;
use token_gateway::config::Config;
use token_gateway::observability::metrics::init_metrics_recorder;
use token_gateway::routes::{self, AppState};

/// Global metrics handle for test servers
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            // Another test binary may already own the global recorder
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Environment for a gateway that trusts [`TEST_ISSUER`] tokens for
/// [`TEST_CLIENT_ID`], with keys from `jwks_url`.
///
/// Refresh-on-miss is not rate limited so rotation tests run quickly.
pub fn test_config(jwks_url: &str) -> HashMap<String, String> {
    HashMap::from([
        ("AUTH_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
        ("AUTH_ISSUER".to_string(), TEST_ISSUER.to_string()),
        ("AUTH_JWKS_URL".to_string(), jwks_url.to_string()),
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("HEALTH_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        (
            "JWKS_MIN_REFRESH_INTERVAL_SECONDS".to_string(),
            "0".to_string(),
        ),
        ("MAX_WAIT_SECONDS".to_string(), "10".to_string()),
    ])
}

/// Test harness for spawning the Token Gateway in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<()> {
///     let provider = MockJwksProvider::start().await;
///     let server = TestGatewayServer::spawn(&provider).await?;
///
///     let response = reqwest::get(format!("{}/health", server.health_url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    health_addr: SocketAddr,
    config: Config,
    jwks_client: Arc<JwksClient>,
    _handle: JoinHandle<()>,
    _health_handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn a gateway backed by `provider` with [`test_config`].
    pub async fn spawn(provider: &MockJwksProvider) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(test_config(&provider.jwks_url())).await
    }

    /// Spawn a gateway from explicit environment variables.
    ///
    /// The main and health servers bind to random ports and start with an
    /// empty key cache; the first authenticated request performs the
    /// cold-start fetch.
    pub async fn spawn_with_vars(vars: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let jwks_client = Arc::new(JwksClient::with_config(
            config.jwks_url.clone(),
            config.jwks_client_config(),
        ));

        let state = Arc::new(AppState {
            config: config.clone(),
            jwks_client: Arc::clone(&jwks_client),
        });

        // Build routes using the gateway's real route builders
        let health_app = routes::build_health_routes(Arc::clone(&state), test_metrics_handle());
        let app = routes::build_routes(state);

        let health_listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test health server: {}", e))?;

        let health_addr = health_listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get health server address: {}", e))?;

        let health_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(health_listener, health_app).await {
                eprintln!("Test health server error: {}", e);
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            health_addr,
            config,
            jwks_client,
            _handle: handle,
            _health_handle: health_handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Base URL of the health and metrics listener.
    pub fn health_url(&self) -> String {
        format!("http://{}", self.health_addr)
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The server's Key Set Cache.
    pub fn jwks_client(&self) -> &Arc<JwksClient> {
        &self.jwks_client
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        self._handle.abort();
        self._health_handle.abort();
    }
}
