//! Run orchestration and the aggregated benchmark report

use crate::conformance::{ConformanceResult, ConformanceSuite};
use crate::error::HarnessError;
use crate::prober::ConcurrencyProber;
use crate::ramp::{CapacityRamp, CapacityReport, RampPolicy};
use crate::sampler::{LatencyMeasurement, LatencySampler};
use chrono::{DateTime, Utc};
use gauge_config::{EndpointConfig, GaugeConfig};
use gauge_http::{preflight, Endpoint, Fetcher, HttpConfig, HttpFetcher, ProxyTarget};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Which parts of a run to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessSteps {
    pub preflight: bool,
    pub latency: bool,
    pub conformance: bool,
    pub capacity: bool,
}

impl HarnessSteps {
    pub fn all() -> Self {
        Self {
            preflight: true,
            latency: true,
            conformance: true,
            capacity: true,
        }
    }

    pub fn none() -> Self {
        Self {
            preflight: false,
            latency: false,
            conformance: false,
            capacity: false,
        }
    }

    pub fn latency_only() -> Self {
        Self {
            preflight: true,
            latency: true,
            ..Self::none()
        }
    }

    pub fn conformance_only() -> Self {
        Self {
            preflight: true,
            conformance: true,
            ..Self::none()
        }
    }

    pub fn capacity_only() -> Self {
        Self {
            preflight: true,
            capacity: true,
            ..Self::none()
        }
    }
}

impl Default for HarnessSteps {
    fn default() -> Self {
        Self::all()
    }
}

/// Endpoints for the conformance checks
#[derive(Debug, Clone)]
pub struct ConformancePlan {
    pub text: Endpoint,
    pub binary: Endpoint,
    pub cache: Endpoint,
}

/// Everything a run needs, resolved from configuration
#[derive(Debug, Clone)]
pub struct HarnessPlan {
    pub proxy: ProxyTarget,
    pub http: HttpConfig,
    /// Sampled in order: small transfer, then large transfer
    pub latency_endpoints: Vec<Endpoint>,
    pub capacity_endpoint: Endpoint,
    /// `None` when the suite is disabled
    pub conformance: Option<ConformancePlan>,
    pub repetitions: u32,
    pub ramp: RampPolicy,
    pub round_timeout: Duration,
    pub preflight_timeout: Duration,
}

fn endpoint(name: &'static str, config: &EndpointConfig) -> Result<Endpoint, HarnessError> {
    Endpoint::try_from(config).map_err(|source| HarnessError::Endpoint { name, source })
}

impl HarnessPlan {
    pub fn from_config(config: &GaugeConfig) -> Result<Self, HarnessError> {
        let conformance = if config.conformance.enabled {
            Some(ConformancePlan {
                text: endpoint("conformance text", &config.conformance.text)?,
                binary: endpoint("conformance binary", &config.conformance.binary)?,
                cache: endpoint("conformance cache", &config.conformance.cache)?,
            })
        } else {
            None
        };

        Ok(Self {
            proxy: ProxyTarget::from(&config.proxy),
            http: HttpConfig::from(config.http.clone()),
            latency_endpoints: vec![
                endpoint("small", &config.endpoints.small)?,
                endpoint("large", &config.endpoints.large)?,
            ],
            capacity_endpoint: endpoint("capacity", &config.endpoints.capacity)?,
            conformance,
            repetitions: config.sampling.repetitions,
            ramp: RampPolicy::from(&config.ramp),
            round_timeout: config.ramp.round_timeout,
            preflight_timeout: config.http.connect_timeout,
        })
    }
}

/// Everything measured in one run. Nothing here is formatted for humans.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub proxy: ProxyTarget,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub latency: Vec<LatencyMeasurement>,
    pub conformance: Vec<ConformanceResult>,
    pub capacity: Option<CapacityReport>,
}

/// Runs preflight, latency sampling, conformance and the capacity ramp in
/// that order and gathers the results.
pub struct Harness {
    plan: HarnessPlan,
    fetcher: Arc<dyn Fetcher>,
}

impl Harness {
    /// Build the real HTTP clients for `config`
    pub fn from_config(config: &GaugeConfig) -> Result<Self, HarnessError> {
        let plan = HarnessPlan::from_config(config)?;
        let fetcher = HttpFetcher::new(plan.http.clone(), Some(plan.proxy.clone()))?;
        Ok(Self::with_fetcher(plan, Arc::new(fetcher)))
    }

    pub fn with_fetcher(plan: HarnessPlan, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { plan, fetcher }
    }

    pub fn plan(&self) -> &HarnessPlan {
        &self.plan
    }

    /// Fails only when the proxy is unreachable at startup. Every other
    /// failure is recorded in the report.
    pub async fn run(&self, steps: HarnessSteps) -> Result<BenchmarkReport, HarnessError> {
        let plan = &self.plan;

        if steps.preflight {
            preflight(&plan.proxy, plan.preflight_timeout).await?;
        }

        let started_at = Utc::now();

        let mut latency = Vec::new();
        if steps.latency {
            let sampler = LatencySampler::new(self.fetcher.clone(), plan.repetitions);
            for endpoint in &plan.latency_endpoints {
                latency.push(sampler.sample(endpoint).await);
            }
        }

        let conformance = match plan.conformance {
            Some(ref endpoints) if steps.conformance => {
                ConformanceSuite::new(
                    self.fetcher.clone(),
                    endpoints.text.clone(),
                    endpoints.binary.clone(),
                    endpoints.cache.clone(),
                )
                .run()
                .await
            }
            _ => Vec::new(),
        };

        let capacity = if steps.capacity {
            let prober = ConcurrencyProber::new(self.fetcher.clone(), plan.round_timeout);
            let ramp = CapacityRamp::new(prober, plan.ramp.clone());
            Some(ramp.run(&plan.capacity_endpoint).await)
        } else {
            None
        };

        let finished_at = Utc::now();
        info!(
            "Benchmark of proxy {} finished in {}s",
            plan.proxy,
            (finished_at - started_at).num_seconds()
        );

        Ok(BenchmarkReport {
            proxy: plan.proxy.clone(),
            started_at,
            finished_at,
            latency,
            conformance,
            capacity,
        })
    }
}
