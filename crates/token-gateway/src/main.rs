//! Token Gateway
//!
//! Entry point for the token verification gateway. Serves a protected
//! resource to callers presenting a valid identity-provider token.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use token_gateway::auth::JwksClient;
use token_gateway::config::{Config, LogFormat};
use token_gateway::observability::metrics::init_metrics_recorder;
use token_gateway::routes::{self, AppState};
use token_gateway::tasks::start_jwks_refresher;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    // Log format comes from config; fall back to text so a config error is still logged
    init_tracing(
        config
            .as_ref()
            .map(|c| c.log_format)
            .unwrap_or(LogFormat::Text),
    );

    info!("Starting Token Gateway");

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        health_bind_address = %config.health_bind_address,
        issuer = %config.issuer,
        jwks_url = %config.jwks_url,
        jwks_cache_ttl_secs = config.jwks_cache_ttl.as_secs(),
        max_wait_seconds = config.max_wait_seconds,
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let jwks_client = Arc::new(JwksClient::with_config(
        config.jwks_url.clone(),
        config.jwks_client_config(),
    ));

    // Warm the key cache; a failure here is retried by the refresher and
    // by the first request
    match jwks_client.refresh().await {
        Ok(key_count) => info!(key_count, "JWKS loaded"),
        Err(e) => warn!(error = %e, "Initial JWKS fetch failed, starting with an empty key set"),
    }

    let cancel_token = CancellationToken::new();
    let refresher_handle = tokio::spawn(start_jwks_refresher(
        Arc::clone(&jwks_client),
        config.jwks_cache_ttl,
        cancel_token.clone(),
    ));

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        e
    })?;
    let drain_period = config.drain_period;

    let state = Arc::new(AppState {
        config,
        jwks_client,
    });

    // Health and metrics on their own listener; bind before spawning to fail fast
    let health_app = routes::build_health_routes(Arc::clone(&state), metrics_handle);
    let health_listener = TcpListener::bind(health_addr).await.map_err(|e| {
        error!(error = %e, addr = %health_addr, "Failed to bind health server");
        e
    })?;

    let health_shutdown_token = cancel_token.child_token();
    let health_handle = tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(health_listener, health_app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    let app = routes::build_routes(state);

    info!("Token Gateway listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(drain_period))
    .await?;

    // Stop background tasks and the health server
    cancel_token.cancel();
    if let Err(e) = refresher_handle.await {
        warn!("JWKS refresher task ended abnormally: {}", e);
    }
    if let Err(e) = health_handle.await {
        warn!("Health server task ended abnormally: {}", e);
    }

    info!("Token Gateway shutdown complete");

    Ok(())
}

/// Install the global tracing subscriber.
fn init_tracing(log_format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "token_gateway=info,gw=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal(drain_period: Duration) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if !drain_period.is_zero() {
        warn!("Draining connections for {} seconds...", drain_period.as_secs());
        tokio::time::sleep(drain_period).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (GATEWAY_DRAIN_SECONDS=0)");
    }
}
