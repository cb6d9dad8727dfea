//! Single-request correctness checks: text, binary and cache fidelity

use crate::baseline::{Baseline, BaselineOracle};
use crate::error::ProbeError;
use crate::verify::{verify, MismatchReason};
use gauge_http::{Endpoint, FetchError, FetchResult, Fetcher, Route};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConformanceCheck {
    TextFidelity,
    BinaryFidelity,
    CacheFidelity,
}

impl ConformanceCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConformanceCheck::TextFidelity => "text fidelity",
            ConformanceCheck::BinaryFidelity => "binary fidelity",
            ConformanceCheck::CacheFidelity => "cache fidelity",
        }
    }
}

impl fmt::Display for ConformanceCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "failure", rename_all = "snake_case")]
pub enum ConformanceFailure {
    /// The direct reference fetch failed; the proxy is not blamed
    BaselineUnavailable { reason: FetchError },

    /// Proxied fetch number `fetch` (1-based) did not match the baseline
    Mismatch { fetch: usize, reason: MismatchReason },

    /// The second proxied fetch was not faster than the first
    CacheNotFaster { cold_ms: u64, warm_ms: u64 },
}

impl fmt::Display for ConformanceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConformanceFailure::BaselineUnavailable { reason } => {
                write!(f, "baseline unavailable: {}", reason)
            }
            ConformanceFailure::Mismatch { fetch, reason } => {
                write!(f, "proxied fetch {}: {}", fetch, reason)
            }
            ConformanceFailure::CacheNotFaster { cold_ms, warm_ms } => write!(
                f,
                "warm fetch took {}ms, cold fetch {}ms",
                warm_ms, cold_ms
            ),
        }
    }
}

/// Elapsed times observed by a check, in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConformanceTimings {
    pub direct_ms: Option<u64>,
    /// One entry per proxied fetch, in issue order
    pub proxied_ms: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConformanceResult {
    pub check: ConformanceCheck,
    pub url: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ConformanceFailure>,
    pub timings: ConformanceTimings,
}

impl ConformanceResult {
    fn new(
        check: ConformanceCheck,
        endpoint: &Endpoint,
        failure: Option<ConformanceFailure>,
        timings: ConformanceTimings,
    ) -> Self {
        Self {
            check,
            url: endpoint.url.to_string(),
            passed: failure.is_none(),
            failure,
            timings,
        }
    }
}

fn millis(elapsed: Duration) -> u64 {
    elapsed.as_millis() as u64
}

/// Runs the three checks sequentially against one fetcher
#[derive(Clone)]
pub struct ConformanceSuite {
    fetcher: Arc<dyn Fetcher>,
    oracle: BaselineOracle,
    text: Endpoint,
    binary: Endpoint,
    cache: Endpoint,
}

impl ConformanceSuite {
    pub fn new(fetcher: Arc<dyn Fetcher>, text: Endpoint, binary: Endpoint, cache: Endpoint) -> Self {
        Self {
            oracle: BaselineOracle::new(fetcher.clone()),
            fetcher,
            text,
            binary,
            cache,
        }
    }

    pub async fn run(&self) -> Vec<ConformanceResult> {
        let results = vec![
            self.check_fidelity(ConformanceCheck::TextFidelity, &self.text)
                .await,
            self.check_fidelity(ConformanceCheck::BinaryFidelity, &self.binary)
                .await,
            self.check_cache(&self.cache).await,
        ];

        let passed = results.iter().filter(|result| result.passed).count();
        info!("Conformance: {}/{} checks passed", passed, results.len());
        results
    }

    /// One direct and one proxied fetch; pass iff byte-identical
    pub async fn check_fidelity(
        &self,
        check: ConformanceCheck,
        endpoint: &Endpoint,
    ) -> ConformanceResult {
        let mut timings = ConformanceTimings::default();
        let baseline = match self.baseline(endpoint, &mut timings).await {
            Ok(baseline) => baseline,
            Err(failure) => return Self::finish(check, endpoint, Some(failure), timings),
        };

        let proxied = self.fetch_proxied(endpoint, &mut timings).await;
        let failure = mismatch(1, &proxied, &baseline);
        Self::finish(check, endpoint, failure, timings)
    }

    /// Two proxied fetches in sequence. Pass iff both match the baseline and
    /// the warm fetch is strictly faster than the cold one.
    pub async fn check_cache(&self, endpoint: &Endpoint) -> ConformanceResult {
        let check = ConformanceCheck::CacheFidelity;
        let mut timings = ConformanceTimings::default();
        let baseline = match self.baseline(endpoint, &mut timings).await {
            Ok(baseline) => baseline,
            Err(failure) => return Self::finish(check, endpoint, Some(failure), timings),
        };

        let cold = self.fetch_proxied(endpoint, &mut timings).await;
        let warm = self.fetch_proxied(endpoint, &mut timings).await;

        let failure = mismatch(1, &cold, &baseline)
            .or_else(|| mismatch(2, &warm, &baseline))
            .or_else(|| {
                (warm.elapsed >= cold.elapsed).then(|| ConformanceFailure::CacheNotFaster {
                    cold_ms: millis(cold.elapsed),
                    warm_ms: millis(warm.elapsed),
                })
            });
        Self::finish(check, endpoint, failure, timings)
    }

    async fn baseline(
        &self,
        endpoint: &Endpoint,
        timings: &mut ConformanceTimings,
    ) -> Result<Baseline, ConformanceFailure> {
        match self.oracle.fetch(endpoint).await {
            Ok(baseline) => {
                timings.direct_ms = Some(millis(baseline.elapsed()));
                Ok(baseline)
            }
            Err(ProbeError::Baseline { reason, .. }) => {
                Err(ConformanceFailure::BaselineUnavailable { reason })
            }
        }
    }

    async fn fetch_proxied(&self, endpoint: &Endpoint, timings: &mut ConformanceTimings) -> FetchResult {
        let result = self.fetcher.fetch(endpoint, Route::Proxied).await;
        timings.proxied_ms.push(millis(result.elapsed));
        result
    }

    fn finish(
        check: ConformanceCheck,
        endpoint: &Endpoint,
        failure: Option<ConformanceFailure>,
        timings: ConformanceTimings,
    ) -> ConformanceResult {
        match failure {
            None => info!("{} PASSED ({})", check, endpoint),
            Some(ref failure) => warn!("{} FAILED ({}): {}", check, endpoint, failure),
        }
        ConformanceResult::new(check, endpoint, failure, timings)
    }
}

fn mismatch(fetch: usize, candidate: &FetchResult, baseline: &Baseline) -> Option<ConformanceFailure> {
    verify(fetch, candidate, baseline)
        .reason
        .map(|reason| ConformanceFailure::Mismatch { fetch, reason })
}
