//! Direct reference fetches

use crate::error::ProbeError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use gauge_http::{Endpoint, FetchResult, Fetcher, Route};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Known-good response for one round.
///
/// Content may legitimately change between rounds, so a baseline is fetched
/// fresh for every round and held fixed while that round is verified.
#[derive(Debug, Clone)]
pub struct Baseline {
    bytes: Bytes,
    status: Option<u16>,
    elapsed: Duration,
    fetched_at: DateTime<Utc>,
}

impl Baseline {
    /// Baseline from raw bytes, without a fetch
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            status: None,
            elapsed: Duration::ZERO,
            fetched_at: Utc::now(),
        }
    }

    fn from_fetch(result: FetchResult) -> Self {
        Self {
            bytes: result.bytes,
            status: result.status,
            elapsed: result.elapsed,
            fetched_at: Utc::now(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// The baseline viewed as a successful direct fetch
    pub fn as_fetch_result(&self) -> FetchResult {
        FetchResult::success(
            Route::Direct,
            self.status.unwrap_or(200),
            self.bytes.clone(),
            self.elapsed,
        )
    }
}

/// Produces the ground truth for a round via a direct (non-proxied) fetch
#[derive(Clone)]
pub struct BaselineOracle {
    fetcher: Arc<dyn Fetcher>,
}

impl BaselineOracle {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn fetch(&self, endpoint: &Endpoint) -> Result<Baseline, ProbeError> {
        let result = self.fetcher.fetch(endpoint, Route::Direct).await;

        match result.error {
            Some(reason) => {
                warn!("Baseline fetch of {} failed: {}", endpoint, reason);
                Err(ProbeError::Baseline {
                    url: endpoint.url.to_string(),
                    reason,
                })
            }
            None => {
                debug!(
                    "Baseline for {}: {} bytes in {:?}",
                    endpoint,
                    result.bytes.len(),
                    result.elapsed
                );
                Ok(Baseline::from_fetch(result))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedFetcher;
    use gauge_http::{FetchError, TransferClass};

    fn endpoint() -> Endpoint {
        Endpoint::parse("http://origin.test/page", TransferClass::Small, "text/html").unwrap()
    }

    #[tokio::test]
    async fn test_oracle_fetches_directly() {
        let fetcher = Arc::new(ScriptedFetcher::new("reference body"));
        let oracle = BaselineOracle::new(fetcher.clone());

        let baseline = oracle.fetch(&endpoint()).await.unwrap();
        assert_eq!(baseline.bytes(), b"reference body");
        assert_eq!(baseline.status(), Some(200));
        assert_eq!(fetcher.direct_calls(), 1);
        assert_eq!(fetcher.proxied_calls(), 0);
    }

    #[tokio::test]
    async fn test_oracle_surfaces_direct_failure() {
        let fetcher = Arc::new(
            ScriptedFetcher::new("unused").fail_direct(FetchError::Connect("refused".into())),
        );
        let oracle = BaselineOracle::new(fetcher);

        let err = oracle.fetch(&endpoint()).await.unwrap_err();
        let ProbeError::Baseline { url, reason } = err;
        assert_eq!(url, "http://origin.test/page");
        assert_eq!(reason, FetchError::Connect("refused".into()));
    }
}
