//! JWKS client for fetching and caching the identity provider's signing keys.
//!
//! The JWKS (JSON Web Key Set) client fetches public keys from the provider's
//! `/.well-known/jwks.json` endpoint and publishes them as an immutable
//! [`KeySetSnapshot`].
//!
//! # Concurrency
//!
//! - Readers load the current snapshot through an `ArcSwapOption` and never
//!   take a lock
//! - A refresh builds a complete new snapshot and swaps it in; readers see
//!   either the old or the new snapshot, never a mix
//! - Refreshes are single-flight: foreground refreshes queue on the refresh
//!   lock, background refreshes are skipped when one is already running
//!
//! # Refresh policy
//!
//! - Cold start: the first lookup fetches synchronously, bounded by the fetch
//!   timeout
//! - TTL: a lookup that finds the snapshot older than the TTL schedules a
//!   background refresh and is served from the stale snapshot
//! - Unknown `kid`: schedules a background refresh (rate limited by the
//!   minimum refresh interval) and returns `NotFound` immediately
//! - Failed fetches leave the previous snapshot in place

use crate::observability::metrics::{record_jwks_refresh, set_jwks_keys};
use arc_swap::ArcSwapOption;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;

/// Default cache TTL in seconds (5 minutes).
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Default fetch timeout in seconds.
const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 5;

/// Default minimum spacing between background refreshes in seconds.
const DEFAULT_MIN_REFRESH_INTERVAL_SECONDS: u64 = 30;

/// Largest JWKS response body accepted (64KB).
pub const MAX_JWKS_BODY_BYTES: usize = 64 * 1024;

/// JSON Web Key from the JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type (must be "RSA").
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Algorithm (RS256 when absent).
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (must be "sig" when present).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,
}

/// JWKS response from the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Reasons a JWK cannot be turned into a [`SigningKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JwkError {
    #[error("JWK has no kid")]
    MissingKid,

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("JWK is not a signing key (use={0})")]
    NotSigningKey(String),

    #[error("JWK missing component: {0}")]
    MissingComponent(&'static str),

    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

/// A verification key with its server-side pinned algorithm.
///
/// The algorithm comes from the JWK metadata, never from a token header.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    algorithm: Algorithm,
    decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Build a signing key from a JWK, enforcing RSA signature keys only.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, JwkError> {
        let kid = jwk
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or(JwkError::MissingKid)?;

        if jwk.kty != "RSA" {
            return Err(JwkError::UnsupportedKeyType(jwk.kty.clone()));
        }

        if let Some(key_use) = jwk.key_use.as_deref() {
            if key_use != "sig" {
                return Err(JwkError::NotSigningKey(key_use.to_string()));
            }
        }

        let algorithm = match jwk.alg.as_deref() {
            None | Some("RS256") => Algorithm::RS256,
            Some("RS384") => Algorithm::RS384,
            Some("RS512") => Algorithm::RS512,
            Some(other) => return Err(JwkError::UnsupportedAlgorithm(other.to_string())),
        };

        let n = jwk.n.as_deref().ok_or(JwkError::MissingComponent("n"))?;
        let e = jwk.e.as_deref().ok_or(JwkError::MissingComponent("e"))?;

        let decoding_key = DecodingKey::from_rsa_components(n, e)
            .map_err(|err| JwkError::InvalidKey(err.to_string()))?;

        Ok(Self {
            kid: kid.to_string(),
            algorithm,
            decoding_key,
        })
    }

    /// Key ID.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The only algorithm this key verifies.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// An immutable, complete view of the provider's key set.
#[derive(Debug)]
pub struct KeySetSnapshot {
    keys: HashMap<String, Arc<SigningKey>>,
    fetched_at: Instant,
}

impl KeySetSnapshot {
    /// Build a snapshot from already-validated keys.
    pub fn new(keys: impl IntoIterator<Item = SigningKey>) -> Self {
        let keys = keys
            .into_iter()
            .map(|key| (key.kid.clone(), Arc::new(key)))
            .collect();

        Self {
            keys,
            fetched_at: Instant::now(),
        }
    }

    /// Exact `kid` lookup.
    pub fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.get(kid).cloned()
    }

    /// Number of keys in the snapshot.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the snapshot holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Time since the snapshot was fetched.
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Failure to retrieve or parse the key set.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("JWKS request failed: {0}")]
    Http(String),

    #[error("JWKS request timed out")]
    Timeout,

    #[error("JWKS endpoint returned status {0}")]
    Status(u16),

    #[error("JWKS response exceeds {MAX_JWKS_BODY_BYTES} bytes")]
    BodyTooLarge,

    #[error("JWKS response could not be parsed: {0}")]
    Parse(String),

    #[error("JWKS response contains no usable signing keys")]
    NoUsableKeys,
}

impl FetchError {
    /// Bounded label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            FetchError::Http(_) => "http",
            FetchError::Timeout => "timeout",
            FetchError::Status(_) => "status",
            FetchError::BodyTooLarge => "body_too_large",
            FetchError::Parse(_) => "parse",
            FetchError::NoUsableKeys => "no_usable_keys",
        }
    }
}

/// Failure to produce a key for a `kid`.
#[derive(Debug, Clone, Error)]
pub enum KeyLookupError {
    /// The current snapshot has no key with this `kid`.
    #[error("signing key not found")]
    NotFound,

    /// No snapshot could be obtained.
    #[error("key set unavailable: {0}")]
    Unavailable(FetchError),
}

/// Tuning knobs for [`JwksClient`].
#[derive(Debug, Clone, Copy)]
pub struct JwksClientConfig {
    /// How long a snapshot is considered fresh.
    pub cache_ttl: Duration,

    /// Bound on a single fetch and on cold-start waits.
    pub fetch_timeout: Duration,

    /// Minimum spacing between background refresh attempts.
    pub min_refresh_interval: Duration,
}

impl Default for JwksClientConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
            min_refresh_interval: Duration::from_secs(DEFAULT_MIN_REFRESH_INTERVAL_SECONDS),
        }
    }
}

/// Bookkeeping guarded by the refresh lock.
#[derive(Debug, Default)]
struct RefreshState {
    last_attempt: Option<Instant>,
}

/// JWKS client for fetching and caching signing keys.
///
/// Cheap to clone; clones share the same snapshot and refresh lock.
#[derive(Clone)]
pub struct JwksClient {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Current snapshot, `None` until the first successful fetch.
    snapshot: Arc<ArcSwapOption<KeySetSnapshot>>,

    /// Serializes refreshes.
    refresh_state: Arc<Mutex<RefreshState>>,

    config: JwksClientConfig,
}

impl JwksClient {
    /// Create a new JWKS client with default tuning.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL to the identity provider's JWKS endpoint
    pub fn new(jwks_url: String) -> Self {
        Self::with_config(jwks_url, JwksClientConfig::default())
    }

    /// Create a new JWKS client with custom tuning.
    pub fn with_config(jwks_url: String, config: JwksClientConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gw.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            snapshot: Arc::new(ArcSwapOption::empty()),
            refresh_state: Arc::new(Mutex::new(RefreshState::default())),
            config,
        }
    }

    /// The JWKS endpoint this client fetches from.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// The current snapshot, if one has ever been fetched.
    pub fn snapshot(&self) -> Option<Arc<KeySetSnapshot>> {
        self.snapshot.load_full()
    }

    /// Whether the snapshot is missing or older than the TTL.
    pub fn is_stale(&self) -> bool {
        match self.snapshot.load_full() {
            Some(snapshot) => snapshot.age() >= self.config.cache_ttl,
            None => true,
        }
    }

    /// Get a signing key by key ID.
    ///
    /// Fetches synchronously only when no snapshot exists yet. A miss in an
    /// existing snapshot returns `NotFound` immediately and may schedule a
    /// background refresh to pick up rotated keys.
    ///
    /// # Errors
    ///
    /// Returns `KeyLookupError::NotFound` if the key ID is not in the snapshot.
    /// Returns `KeyLookupError::Unavailable` if no snapshot could be fetched.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Arc<SigningKey>, KeyLookupError> {
        let snapshot = match self.snapshot.load_full() {
            Some(snapshot) => snapshot,
            None => self.cold_start().await?,
        };

        if snapshot.age() >= self.config.cache_ttl {
            self.schedule_refresh("ttl_expired");
        }

        if let Some(key) = snapshot.get(kid) {
            tracing::debug!(target: "gw.auth.jwks", kid = %kid, "JWKS cache hit");
            return Ok(key);
        }

        tracing::debug!(target: "gw.auth.jwks", kid = %kid, "Key not found in JWKS snapshot");
        self.schedule_refresh("unknown_kid");
        Err(KeyLookupError::NotFound)
    }

    /// Force a refresh, waiting for any in-flight refresh first.
    ///
    /// Returns the number of keys in the new snapshot. On failure the previous
    /// snapshot stays in place.
    pub async fn refresh(&self) -> Result<usize, FetchError> {
        let mut state = self.refresh_state.lock().await;
        self.refresh_locked(&mut state, "manual")
            .await
            .map(|snapshot| snapshot.len())
    }

    /// First fetch, shared by all callers that arrive before it completes.
    async fn cold_start(&self) -> Result<Arc<KeySetSnapshot>, KeyLookupError> {
        let fetch = async {
            let mut state = self.refresh_state.lock().await;

            // Another caller may have populated the cache while we waited
            if let Some(snapshot) = self.snapshot.load_full() {
                return Ok(snapshot);
            }

            self.refresh_locked(&mut state, "cold_start").await
        };

        match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(result) => result.map_err(KeyLookupError::Unavailable),
            Err(_) => {
                tracing::warn!(
                    target: "gw.auth.jwks",
                    timeout_ms = self.config.fetch_timeout.as_millis() as u64,
                    "Timed out waiting for initial JWKS fetch"
                );
                Err(KeyLookupError::Unavailable(FetchError::Timeout))
            }
        }
    }

    /// Spawn a background refresh unless one is running or one ran recently.
    fn schedule_refresh(&self, trigger: &'static str) -> bool {
        let Ok(mut state) = self.refresh_state.clone().try_lock_owned() else {
            tracing::debug!(target: "gw.auth.jwks", trigger, "JWKS refresh already in flight");
            return false;
        };

        if let Some(last_attempt) = state.last_attempt {
            if last_attempt.elapsed() < self.config.min_refresh_interval {
                tracing::debug!(target: "gw.auth.jwks", trigger, "JWKS refreshed recently, skipping");
                return false;
            }
        }

        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.refresh_locked(&mut state, trigger).await {
                tracing::warn!(target: "gw.auth.jwks", trigger, error = %e, "Background JWKS refresh failed");
            }
        });

        true
    }

    /// Fetch and publish a new snapshot. Caller holds the refresh lock.
    #[instrument(skip(self, state))]
    async fn refresh_locked(
        &self,
        state: &mut RefreshState,
        trigger: &'static str,
    ) -> Result<Arc<KeySetSnapshot>, FetchError> {
        state.last_attempt = Some(Instant::now());
        let start = Instant::now();

        match self.fetch_key_set().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.snapshot.store(Some(Arc::clone(&snapshot)));

                record_jwks_refresh(trigger, "success", None, start.elapsed());
                set_jwks_keys(snapshot.len());

                tracing::info!(
                    target: "gw.auth.jwks",
                    trigger,
                    key_count = snapshot.len(),
                    "JWKS cache refreshed"
                );
                Ok(snapshot)
            }
            Err(e) => {
                record_jwks_refresh(trigger, "error", Some(e.as_label()), start.elapsed());

                tracing::error!(
                    target: "gw.auth.jwks",
                    trigger,
                    error = %e,
                    has_stale_snapshot = self.snapshot.load().is_some(),
                    "Failed to refresh JWKS"
                );
                Err(e)
            }
        }
    }

    /// Retrieve and parse the key set without touching the cache.
    async fn fetch_key_set(&self) -> Result<KeySetSnapshot, FetchError> {
        tracing::debug!(target: "gw.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let mut response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        if response
            .content_length()
            .is_some_and(|len| len > MAX_JWKS_BODY_BYTES as u64)
        {
            return Err(FetchError::BodyTooLarge);
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
            if body.len() + chunk.len() > MAX_JWKS_BODY_BYTES {
                return Err(FetchError::BodyTooLarge);
            }
            body.extend_from_slice(&chunk);
        }

        let jwks: JwksResponse =
            serde_json::from_slice(&body).map_err(|e| FetchError::Parse(e.to_string()))?;

        let mut keys: HashMap<String, SigningKey> = HashMap::with_capacity(jwks.keys.len());
        for jwk in &jwks.keys {
            match SigningKey::from_jwk(jwk) {
                Ok(key) => {
                    if keys.contains_key(key.kid()) {
                        tracing::warn!(target: "gw.auth.jwks", kid = %key.kid(), "Duplicate kid in JWKS, keeping first");
                        continue;
                    }
                    keys.insert(key.kid().to_string(), key);
                }
                Err(e) => {
                    tracing::warn!(
                        target: "gw.auth.jwks",
                        kid = ?jwk.kid,
                        kty = %jwk.kty,
                        error = %e,
                        "Skipping unusable JWK"
                    );
                }
            }
        }

        if keys.is_empty() {
            return Err(FetchError::NoUsableKeys);
        }

        Ok(KeySetSnapshot::new(keys.into_values()))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Http(e.to_string())
    }
}
