//! Metrics definitions for the Token Gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gw_` prefix for the Token Gateway
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 8 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS,
//!   OTHER)
//! - `endpoint`: 2 values (`/` and every other resource path collapsed)
//! - `status`: 3 values (success, error, timeout)
//! - `outcome`: success plus one value per `AuthRejection` variant
//! - `trigger`: cold_start, ttl_expired, unknown_kid, manual
//! - `error_type`: bounded by `FetchError` variants

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // HTTP requests include deliberate waits, so the buckets reach into minutes
        .set_buckets_for_metric(
            Matcher::Prefix("gw_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
                30.000, 60.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Authentication is dominated by one RSA verification
        .set_buckets_for_metric(
            Matcher::Prefix("gw_auth_duration".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.500, 1.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set auth buckets: {e}"))?
        // JWKS fetches are bounded by the fetch timeout (max 60s)
        .set_buckets_for_metric(
            Matcher::Prefix("gw_jwks_refresh".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000,
                60.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Full("gw_wait_applied_seconds".to_string()),
            &[0.0, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0, 3600.0],
        )
        .map_err(|e| format!("Failed to set wait buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gw_http_requests_total`, `gw_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// This captures ALL HTTP responses including pre-flight responses, 401s from
/// the auth layer, and framework-level errors like 404 and 405.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_method = normalize_method(method);
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gw_http_request_duration_seconds",
        "method" => normalized_method,
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gw_http_requests_total",
        "method" => normalized_method,
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Collapse extension methods into one label value
fn normalize_method(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "POST" => "POST",
        "PUT" => "PUT",
        "PATCH" => "PATCH",
        "DELETE" => "DELETE",
        "HEAD" => "HEAD",
        "OPTIONS" => "OPTIONS",
        _ => "OTHER",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
///
/// Every protected resource path shares one label.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        _ => "/{resource}",
    }
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record one authentication decision.
///
/// Metric: `gw_auth_attempts_total`, `gw_auth_duration_seconds`
/// Labels: `outcome`
///
/// `outcome` is "success" or an `AuthRejection` label. Claim sub-reasons are
/// logged, not labelled.
pub fn record_auth_attempt(outcome: &'static str, duration: Duration) {
    histogram!("gw_auth_duration_seconds",
        "outcome" => outcome
    )
    .record(duration.as_secs_f64());

    counter!("gw_auth_attempts_total",
        "outcome" => outcome
    )
    .increment(1);
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a JWKS refresh attempt.
///
/// Metric: `gw_jwks_refresh_total`, `gw_jwks_refresh_duration_seconds`,
/// `gw_jwks_refresh_failures_total`
/// Labels: `trigger`, `status`, `error_type`
///
/// # Arguments
///
/// * `trigger` - What caused the refresh
/// * `status` - "success" or "error"
/// * `error_type` - `FetchError` label for failures
/// * `duration` - Duration of the fetch
pub fn record_jwks_refresh(
    trigger: &'static str,
    status: &'static str,
    error_type: Option<&'static str>,
    duration: Duration,
) {
    histogram!("gw_jwks_refresh_duration_seconds").record(duration.as_secs_f64());

    counter!("gw_jwks_refresh_total",
        "trigger" => trigger,
        "status" => status
    )
    .increment(1);

    if let Some(err_type) = error_type {
        counter!("gw_jwks_refresh_failures_total",
            "error_type" => err_type
        )
        .increment(1);
    }
}

/// Set the number of keys in the current JWKS snapshot.
///
/// Metric: `gw_jwks_keys`
#[allow(clippy::cast_precision_loss)] // key counts are tiny
pub fn set_jwks_keys(count: usize) {
    gauge!("gw_jwks_keys").set(count as f64);
}

// ============================================================================
// Handler Metrics
// ============================================================================

/// Record the delay applied to an authenticated request.
///
/// Metric: `gw_wait_applied_seconds`
/// Labels: `clamped` ("true" when the requested wait exceeded the maximum)
#[allow(clippy::cast_precision_loss)] // waits are bounded by MAX_WAIT_SECONDS_LIMIT
pub fn record_wait(applied_seconds: u64, clamped: bool) {
    histogram!("gw_wait_applied_seconds",
        "clamped" => if clamped { "true" } else { "false" }
    )
    .record(applied_seconds as f64);
}
