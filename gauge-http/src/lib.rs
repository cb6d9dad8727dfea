//! HTTP fetching for proxy-gauge
//!
//! A single GET, either straight to the origin or through the proxy under
//! test, returning the raw body and the wall time it took. Failures never
//! escape as errors: they are carried inside the [`FetchResult`] so that a
//! caller judging many concurrent fetches can attribute each one.

pub mod client;
pub mod config;
pub mod errors;
pub mod preflight;
pub mod types;

// Re-export main types for convenience
pub use client::{Fetcher, HttpFetcher};
pub use config::HttpConfig;
pub use errors::{FetchError, PreflightError};
pub use preflight::preflight;
pub use types::{Endpoint, FetchResult, ProxyTarget, Route, TransferClass};
