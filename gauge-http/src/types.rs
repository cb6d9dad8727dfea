//! Fetch targets and results

use crate::errors::FetchError;
use bytes::Bytes;
use gauge_config::{EndpointConfig, ProxyConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

pub use gauge_config::TransferClass;

/// A target resource. Immutable once built from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub url: Url,
    pub transfer_class: TransferClass,
    pub content_type: String,
}

impl Endpoint {
    pub fn new(url: Url, transfer_class: TransferClass, content_type: impl Into<String>) -> Self {
        Self {
            url,
            transfer_class,
            content_type: content_type.into(),
        }
    }

    pub fn parse(
        url: &str,
        transfer_class: TransferClass,
        content_type: impl Into<String>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?, transfer_class, content_type))
    }
}

impl TryFrom<&EndpointConfig> for Endpoint {
    type Error = url::ParseError;

    fn try_from(config: &EndpointConfig) -> Result<Self, Self::Error> {
        Endpoint::parse(&config.url, config.transfer_class, config.content_type.clone())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// The proxy under test, fixed for the duration of a run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyTarget {
    pub host: String,
    pub port: u16,
}

impl ProxyTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// URL handed to the HTTP client's proxy setting
    pub fn proxy_url(&self) -> String {
        format!("http://{}", self)
    }
}

impl From<&ProxyConfig> for ProxyTarget {
    fn from(config: &ProxyConfig) -> Self {
        ProxyTarget::new(config.host.clone(), config.port)
    }
}

impl fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // IPv6 literals need brackets to be told apart from the port
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// How a fetch reaches the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Direct,
    Proxied,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Direct => "direct",
            Route::Proxied => "proxied",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one GET. Owned by whoever asked for it and never mutated.
///
/// On failure `bytes` is empty and `error` says why; `elapsed` is the time
/// spent before giving up.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub route: Route,
    pub bytes: Bytes,
    pub elapsed: Duration,
    pub status: Option<u16>,
    pub error: Option<FetchError>,
}

impl FetchResult {
    pub fn success(route: Route, status: u16, bytes: Bytes, elapsed: Duration) -> Self {
        Self {
            route,
            bytes,
            elapsed,
            status: Some(status),
            error: None,
        }
    }

    pub fn failure(route: Route, error: FetchError, elapsed: Duration) -> Self {
        Self {
            route,
            bytes: Bytes::new(),
            elapsed,
            status: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
