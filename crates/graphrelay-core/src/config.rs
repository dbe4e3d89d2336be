//! Relay configuration.
//!
//! Endpoint URLs resolve flag → environment → default; the defaults point
//! at the public deployment this gateway fronts. The per-call timeout
//! policy is "wait indefinitely" unless a deployment overrides it.

use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::error::RelayError;
use crate::stage::StageEndpoints;

pub const DEFAULT_LOOKUP_URL: &str = "https://automat.renci.org/robokopkg/1.2/query";
pub const DEFAULT_OVERLAY_URL: &str = "https://aragorn-ranker.renci.org/1.2/omnicorp_overlay";
pub const DEFAULT_WEIGHTING_URL: &str = "https://aragorn-ranker.renci.org/1.2/weight_correctness";
pub const DEFAULT_SCORING_URL: &str = "https://aragorn-ranker.renci.org/1.2/score";
pub const DEFAULT_NORMALIZER_URL: &str =
    "https://nodenormalization-sri.renci.org/get_normalized_nodes";

pub const LOOKUP_URL_ENV: &str = "GRAPHRELAY_LOOKUP_URL";
pub const OVERLAY_URL_ENV: &str = "GRAPHRELAY_OVERLAY_URL";
pub const WEIGHTING_URL_ENV: &str = "GRAPHRELAY_WEIGHTING_URL";
pub const SCORING_URL_ENV: &str = "GRAPHRELAY_SCORING_URL";
pub const NORMALIZER_URL_ENV: &str = "GRAPHRELAY_NORMALIZER_URL";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub listen: SocketAddr,
    pub endpoints: StageEndpoints,
    /// `None` disables identifier normalization (passthrough).
    pub normalizer_url: Option<Url>,
    /// Per-call timeout for downstream services. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

/// Build the shared outbound client. Constructed once at startup; the
/// connection pool is shared across requests but carries no request state.
pub fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client, RelayError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| RelayError::Internal(format!("failed to build http client: {e}")))
}
