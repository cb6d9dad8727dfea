//! Probe and harness error types

use gauge_http::{FetchError, PreflightError};

/// A round could not be judged at all
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    /// The direct reference fetch failed, so there is nothing to compare against
    #[error("Baseline fetch of {url} failed: {reason}")]
    Baseline { url: String, reason: FetchError },
}

/// Conditions that stop a run before any measurement starts
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    #[error("Invalid {name} endpoint: {source}")]
    Endpoint {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to set up HTTP clients: {0}")]
    Client(#[from] FetchError),
}
