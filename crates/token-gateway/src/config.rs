//! Token Gateway configuration.
//!
//! Configuration is loaded from environment variables. The client identifier
//! is redacted in Debug output.

use crate::auth::jwks::JwksClientConfig;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default bind address for the health and metrics listener.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default shutdown drain period in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Upper bound for `GATEWAY_DRAIN_SECONDS` (5 minutes).
pub const MAX_DRAIN_SECONDS: u64 = 300;

/// Default JWKS cache TTL in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 5;

/// Upper bound for the JWKS fetch timeout in seconds.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Default minimum interval between refreshes triggered by unknown key IDs.
pub const DEFAULT_JWKS_MIN_REFRESH_INTERVAL_SECONDS: u64 = 30;

/// Default clamp for the `wait` query parameter in seconds.
pub const DEFAULT_MAX_WAIT_SECONDS: u64 = 60;

/// Upper bound for `MAX_WAIT_SECONDS` (1 hour).
pub const MAX_WAIT_SECONDS_LIMIT: u64 = 3600;

/// Headroom added on top of the maximum wait for the global request timeout.
pub const REQUEST_TIMEOUT_MARGIN_SECONDS: u64 = 30;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text lines.
    Text,

    /// One JSON object per line.
    Json,
}

/// Token Gateway configuration.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Health, readiness and metrics bind address (default: "0.0.0.0:8081").
    /// Kept off the main listener so every path there requires a token.
    pub health_bind_address: String,

    /// Expected token audience (the identity provider's client identifier).
    pub client_id: String,

    /// Expected token issuer, compared exactly against `iss`. Also the base of
    /// the default JWKS URL.
    pub issuer: String,

    /// URL to the identity provider's JWKS endpoint.
    pub jwks_url: String,

    /// How long a fetched key set is considered fresh.
    pub jwks_cache_ttl: Duration,

    /// Bound on a single JWKS fetch and on cold-start waits.
    pub jwks_fetch_timeout: Duration,

    /// Minimum spacing between refreshes triggered by unknown `kid` values.
    pub jwks_min_refresh_interval: Duration,

    /// JWT clock skew tolerance in seconds for iat validation.
    pub jwt_clock_skew_seconds: i64,

    /// Largest delay a single request may ask for, in seconds.
    pub max_wait_seconds: u64,

    /// Log output format.
    pub log_format: LogFormat,

    /// How long in-flight requests may drain after a shutdown signal.
    pub drain_period: Duration,
}

/// Custom Debug implementation that redacts the client identifier.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("health_bind_address", &self.health_bind_address)
            .field("client_id", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("jwks_url", &self.jwks_url)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .field("jwks_min_refresh_interval", &self.jwks_min_refresh_interval)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("max_wait_seconds", &self.max_wait_seconds)
            .field("log_format", &self.log_format)
            .field("drain_period", &self.drain_period)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid issuer configuration: {0}")]
    InvalidIssuer(String),

    #[error("Invalid JWKS configuration: {0}")]
    InvalidJwks(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid wait configuration: {0}")]
    InvalidMaxWait(String),

    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("Invalid drain period: {0}")]
    InvalidDrainPeriod(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let client_id = vars
            .get("AUTH_CLIENT_ID")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("AUTH_CLIENT_ID".to_string()))?
            .clone();

        let issuer = resolve_issuer(vars)?;

        let jwks_url = vars
            .get("AUTH_JWKS_URL")
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| {
                format!(
                    "{}/.well-known/jwks.json",
                    issuer.trim_end_matches('/')
                )
            });

        if !jwks_url.starts_with("http://") && !jwks_url.starts_with("https://") {
            return Err(ConfigError::InvalidJwks(format!(
                "JWKS URL must be an http(s) URL, got '{}'",
                jwks_url
            )));
        }

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let jwks_cache_ttl = Duration::from_secs(parse_positive_seconds(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
        )?);

        let fetch_timeout_secs = parse_positive_seconds(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
        )?;
        if fetch_timeout_secs > MAX_JWKS_FETCH_TIMEOUT_SECONDS {
            return Err(ConfigError::InvalidJwks(format!(
                "JWKS_FETCH_TIMEOUT_SECONDS must not exceed {} seconds, got {}",
                MAX_JWKS_FETCH_TIMEOUT_SECONDS, fetch_timeout_secs
            )));
        }
        let jwks_fetch_timeout = Duration::from_secs(fetch_timeout_secs);

        let jwks_min_refresh_interval = if let Some(value_str) =
            vars.get("JWKS_MIN_REFRESH_INTERVAL_SECONDS")
        {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwks(format!(
                    "JWKS_MIN_REFRESH_INTERVAL_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;
            Duration::from_secs(value)
        } else {
            Duration::from_secs(DEFAULT_JWKS_MIN_REFRESH_INTERVAL_SECONDS)
        };

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let max_wait_seconds = if let Some(value_str) = vars.get("MAX_WAIT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidMaxWait(format!(
                    "MAX_WAIT_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_WAIT_SECONDS_LIMIT {
                return Err(ConfigError::InvalidMaxWait(format!(
                    "MAX_WAIT_SECONDS must not exceed {} seconds, got {}",
                    MAX_WAIT_SECONDS_LIMIT, value
                )));
            }

            value
        } else {
            DEFAULT_MAX_WAIT_SECONDS
        };

        let log_format = match vars.get("LOG_FORMAT").map(|s| s.to_ascii_lowercase()) {
            None => LogFormat::Text,
            Some(format) if format == "text" => LogFormat::Text,
            Some(format) if format == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidLogFormat(format!(
                    "LOG_FORMAT must be 'text' or 'json', got '{}'",
                    other
                )))
            }
        };

        let drain_period = if let Some(value_str) = vars.get("GATEWAY_DRAIN_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainPeriod(format!(
                    "GATEWAY_DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_DRAIN_SECONDS {
                return Err(ConfigError::InvalidDrainPeriod(format!(
                    "GATEWAY_DRAIN_SECONDS must not exceed {} seconds, got {}",
                    MAX_DRAIN_SECONDS, value
                )));
            }

            Duration::from_secs(value)
        } else {
            Duration::from_secs(DEFAULT_DRAIN_SECONDS)
        };

        Ok(Config {
            bind_address,
            health_bind_address,
            client_id,
            issuer,
            jwks_url,
            jwks_cache_ttl,
            jwks_fetch_timeout,
            jwks_min_refresh_interval,
            jwt_clock_skew_seconds,
            max_wait_seconds,
            log_format,
            drain_period,
        })
    }

    /// Global request timeout: long enough for the largest permitted wait.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.max_wait_seconds + REQUEST_TIMEOUT_MARGIN_SECONDS)
    }

    /// Key Set Cache tuning derived from this configuration.
    pub fn jwks_client_config(&self) -> JwksClientConfig {
        JwksClientConfig {
            cache_ttl: self.jwks_cache_ttl,
            fetch_timeout: self.jwks_fetch_timeout,
            min_refresh_interval: self.jwks_min_refresh_interval,
        }
    }
}

/// Resolve the expected issuer.
///
/// `AUTH_ISSUER` wins and is kept exactly as given, trailing slash included.
/// Otherwise the issuer is derived from a Cognito region and user pool ID.
fn resolve_issuer(vars: &HashMap<String, String>) -> Result<String, ConfigError> {
    if let Some(issuer) = vars.get("AUTH_ISSUER").filter(|v| !v.is_empty()) {
        if !issuer.starts_with("http://") && !issuer.starts_with("https://") {
            return Err(ConfigError::InvalidIssuer(format!(
                "AUTH_ISSUER must be an http(s) URL, got '{}'",
                issuer
            )));
        }
        return Ok(issuer.clone());
    }

    let region = vars
        .get("AUTH_REGION")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar("AUTH_ISSUER or AUTH_REGION".to_string()))?;
    let user_pool_id = vars
        .get("AUTH_USER_POOL_ID")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar("AUTH_USER_POOL_ID".to_string()))?;

    if !region
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ConfigError::InvalidIssuer(format!(
            "AUTH_REGION contains invalid characters: '{}'",
            region
        )));
    }

    Ok(format!(
        "https://cognito-idp.{}.amazonaws.com/{}",
        region, user_pool_id
    ))
}

fn parse_positive_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidJwks(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidJwks(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}
