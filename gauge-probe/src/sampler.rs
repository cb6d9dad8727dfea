//! Sequential latency sampling, direct versus proxied

use crate::throughput::Throughput;
use gauge_http::{Endpoint, Fetcher, Route};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Aggregate of R sequential fetches over one route.
///
/// Failed fetches are counted but excluded from the average.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleStats {
    pub route: Route,
    pub attempts: u32,
    pub failures: u32,
    /// Mean elapsed seconds of the successful fetches
    pub avg_seconds: Option<f64>,
    /// Mean body size of the successful fetches
    pub payload_bytes: Option<u64>,
}

impl SampleStats {
    pub fn successes(&self) -> u32 {
        self.attempts - self.failures
    }
}

/// Running totals for one route; values flow through explicitly, nothing is
/// shared between runs.
#[derive(Debug)]
struct Accumulator {
    route: Route,
    attempts: u32,
    failures: u32,
    total_seconds: f64,
    total_bytes: u64,
}

impl Accumulator {
    fn new(route: Route) -> Self {
        Self {
            route,
            attempts: 0,
            failures: 0,
            total_seconds: 0.0,
            total_bytes: 0,
        }
    }

    fn finish(self) -> SampleStats {
        let successes = self.attempts - self.failures;
        let (avg_seconds, payload_bytes) = if successes == 0 {
            (None, None)
        } else {
            (
                Some(self.total_seconds / successes as f64),
                Some(self.total_bytes / successes as u64),
            )
        };
        SampleStats {
            route: self.route,
            attempts: self.attempts,
            failures: self.failures,
            avg_seconds,
            payload_bytes,
        }
    }
}

/// `(direct - proxied) / direct * 100`; positive means the proxy was faster.
/// Not computable when the direct average is zero.
pub fn percent_overhead(direct_seconds: f64, proxied_seconds: f64) -> Option<f64> {
    if direct_seconds == 0.0 || !direct_seconds.is_finite() || !proxied_seconds.is_finite() {
        return None;
    }
    Some((direct_seconds - proxied_seconds) / direct_seconds * 100.0)
}

/// Latency and throughput of one endpoint with and without the proxy
#[derive(Debug, Clone, Serialize)]
pub struct LatencyMeasurement {
    pub endpoint: Endpoint,
    pub direct: SampleStats,
    pub proxied: SampleStats,
    pub throughput_direct: Option<Throughput>,
    pub throughput_proxied: Option<Throughput>,
    /// `None` means "not computable"
    pub percent_overhead: Option<f64>,
}

impl LatencyMeasurement {
    pub fn new(endpoint: Endpoint, direct: SampleStats, proxied: SampleStats) -> Self {
        let throughput = |stats: &SampleStats| {
            stats
                .avg_seconds
                .zip(stats.payload_bytes)
                .and_then(|(seconds, bytes)| Throughput::from_transfer(bytes, seconds))
        };
        let percent_overhead = direct
            .avg_seconds
            .zip(proxied.avg_seconds)
            .and_then(|(d, p)| percent_overhead(d, p));

        Self {
            throughput_direct: throughput(&direct),
            throughput_proxied: throughput(&proxied),
            percent_overhead,
            endpoint,
            direct,
            proxied,
        }
    }

    pub fn direct_avg_seconds(&self) -> Option<f64> {
        self.direct.avg_seconds
    }

    pub fn proxied_avg_seconds(&self) -> Option<f64> {
        self.proxied.avg_seconds
    }
}

/// Times R sequential fetches per route. Sequential on purpose: concurrency
/// would mix contention into per-request latency.
#[derive(Clone)]
pub struct LatencySampler {
    fetcher: Arc<dyn Fetcher>,
    repetitions: u32,
}

impl LatencySampler {
    pub fn new(fetcher: Arc<dyn Fetcher>, repetitions: u32) -> Self {
        Self {
            fetcher,
            repetitions,
        }
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }

    pub async fn sample(&self, endpoint: &Endpoint) -> LatencyMeasurement {
        info!(
            "Sampling {} transfer {} ({} runs per route)",
            endpoint.transfer_class, endpoint, self.repetitions
        );

        let direct = self.sample_route(endpoint, Route::Direct).await;
        let proxied = self.sample_route(endpoint, Route::Proxied).await;
        let measurement = LatencyMeasurement::new(endpoint.clone(), direct, proxied);

        match measurement.percent_overhead {
            Some(percent) => info!("{}: proxy latency change {:.2}%", endpoint, percent),
            None => warn!("{}: latency change not computable", endpoint),
        }
        measurement
    }

    async fn sample_route(&self, endpoint: &Endpoint, route: Route) -> SampleStats {
        let mut acc = Accumulator::new(route);

        for run in 0..self.repetitions {
            let result = self.fetcher.fetch(endpoint, route).await;
            acc.attempts += 1;

            match result.error {
                Some(ref error) => {
                    acc.failures += 1;
                    warn!("{} run {} of {} failed: {}", route, run + 1, endpoint, error);
                }
                None => {
                    acc.total_seconds += result.elapsed.as_secs_f64();
                    acc.total_bytes += result.bytes.len() as u64;
                    debug!("{} run {}: {:?}", route, run + 1, result.elapsed);
                }
            }
        }

        acc.finish()
    }
}
