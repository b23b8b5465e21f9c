//! Token Gateway models.
//!
//! Response bodies returned by the HTTP handlers.

use serde::{Deserialize, Serialize};

/// Response for protected resource requests.
///
/// `user` is always present and serializes as `null` when the token carries
/// no profile attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceResponse {
    /// Always "ok".
    pub status: String,

    /// Seconds actually waited, after clamping.
    pub waited: u64,

    /// Email or username of the authenticated caller.
    pub user: Option<String>,
}

/// Readiness check response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness status ("ready" or "not_ready").
    pub status: &'static str,

    /// Key set status ("loaded" or "unavailable").
    pub jwks: &'static str,

    /// Number of keys in the current snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_count: Option<usize>,
}
