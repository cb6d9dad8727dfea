//! HTTP error types

use crate::types::ProxyTarget;
use serde::Serialize;
use std::time::Duration;

/// Why a single fetch produced no usable body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchError {
    #[error("Request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP client setup failed: {0}")]
    Builder(String),

    #[error("Proxied fetch requested but no proxy target is configured")]
    NoProxy,

    #[error("Fetch task aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    pub fn timeout(after: Duration) -> Self {
        FetchError::Timeout {
            after_ms: after.as_millis() as u64,
        }
    }

    /// Classify a reqwest failure. `timeout` is the configured bound, reported
    /// because reqwest does not say which limit fired.
    pub fn from_reqwest(error: &reqwest::Error, timeout: Duration) -> Self {
        let detail = error_chain(error);
        if error.is_timeout() {
            FetchError::timeout(timeout)
        } else if error.is_connect() {
            FetchError::Connect(detail)
        } else if error.is_body() || error.is_decode() {
            FetchError::Body(detail)
        } else if error.is_builder() {
            FetchError::Builder(detail)
        } else {
            FetchError::Request(detail)
        }
    }
}

/// Render an error with its full source chain
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Startup failure: the proxy cannot be reached at all
#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("Proxy {target} is unreachable: {reason}")]
    Unreachable { target: ProxyTarget, reason: String },

    #[error("Proxy {target} did not accept a connection within {after:?}")]
    Timeout { target: ProxyTarget, after: Duration },
}
