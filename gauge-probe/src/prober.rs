//! One probing round: N simultaneous proxied fetches against a fresh baseline

use crate::baseline::{Baseline, BaselineOracle};
use crate::error::ProbeError;
use crate::verify::{verify, MismatchReason, VerificationOutcome};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use gauge_http::{Endpoint, FetchError, FetchResult, Fetcher, Route};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;
use tracing::{debug, info, warn};

/// Verdict of one round. Finalised once every fetch has completed or timed
/// out, immutable afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct RoundResult {
    level: usize,
    outcomes: Vec<VerificationOutcome>,
    all_passed: bool,
    started_at: DateTime<Utc>,
    #[serde(rename = "elapsed_secs", serialize_with = "crate::serde_secs::serialize")]
    elapsed: Duration,
}

impl RoundResult {
    /// Outcomes are ordered by launch ordinal regardless of the order they
    /// arrived in; `all_passed` is their conjunction.
    pub fn new(
        level: usize,
        mut outcomes: Vec<VerificationOutcome>,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        outcomes.sort_by_key(|outcome| outcome.index);
        let all_passed = outcomes.iter().all(|outcome| outcome.passed);
        Self {
            level,
            outcomes,
            all_passed,
            started_at,
            elapsed,
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn outcomes(&self) -> &[VerificationOutcome] {
        &self.outcomes
    }

    pub fn all_passed(&self) -> bool {
        self.all_passed
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Failed outcome with the lowest launch ordinal
    pub fn first_failure(&self) -> Option<&VerificationOutcome> {
        self.outcomes.iter().find(|outcome| !outcome.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.passed_count()
    }
}

/// Runs rounds of simultaneous proxied fetches and verifies every response
#[derive(Clone)]
pub struct ConcurrencyProber {
    fetcher: Arc<dyn Fetcher>,
    oracle: BaselineOracle,
    round_timeout: Duration,
}

impl ConcurrencyProber {
    /// `round_timeout` bounds how long the round waits for any one fetch; a
    /// fetch still running after that counts as failed for its slot.
    pub fn new(fetcher: Arc<dyn Fetcher>, round_timeout: Duration) -> Self {
        Self {
            oracle: BaselineOracle::new(fetcher.clone()),
            fetcher,
            round_timeout,
        }
    }

    pub fn round_timeout(&self) -> Duration {
        self.round_timeout
    }

    /// Execute one round at concurrency `level`.
    ///
    /// Fails only when the baseline cannot be fetched. Individual fetch
    /// failures, timeouts and panics become failed outcomes for their slot.
    pub async fn probe(&self, endpoint: &Endpoint, level: usize) -> Result<RoundResult, ProbeError> {
        let baseline = Arc::new(self.oracle.fetch(endpoint).await?);

        let started_at = Utc::now();
        let start = Instant::now();
        debug!("Launching {} concurrent fetches of {}", level, endpoint);

        // Every unit waits here until all of them exist, so the proxy sees the
        // requests together rather than trickling in as tasks are spawned.
        let barrier = Arc::new(Barrier::new(level.max(1)));
        let endpoint = Arc::new(endpoint.clone());

        let handles: Vec<_> = (0..level)
            .map(|index| {
                let fetcher = Arc::clone(&self.fetcher);
                let endpoint = Arc::clone(&endpoint);
                let baseline = Arc::clone(&baseline);
                let barrier = Arc::clone(&barrier);
                let round_timeout = self.round_timeout;

                tokio::spawn(async move {
                    barrier.wait().await;
                    let candidate = fetch_bounded(fetcher.as_ref(), &endpoint, round_timeout).await;
                    verify(index, &candidate, &baseline)
                })
            })
            .collect();

        // Fan-in: join_all keeps launch order, so a panicked unit is still
        // attributed to its own slot.
        let outcomes: Vec<VerificationOutcome> = join_all(handles)
            .await
            .into_iter()
            .enumerate()
            .map(|(index, joined)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Fetch unit {} did not complete: {}", index, e);
                    VerificationOutcome::fail(
                        index,
                        MismatchReason::Fetch {
                            error: FetchError::Aborted(e.to_string()),
                        },
                    )
                }
            })
            .collect();

        let round = RoundResult::new(level, outcomes, started_at, start.elapsed());
        log_round(&round, &baseline);
        Ok(round)
    }
}

async fn fetch_bounded(fetcher: &dyn Fetcher, endpoint: &Endpoint, bound: Duration) -> FetchResult {
    match tokio::time::timeout(bound, fetcher.fetch(endpoint, Route::Proxied)).await {
        Ok(result) => result,
        Err(_) => FetchResult::failure(Route::Proxied, FetchError::timeout(bound), bound),
    }
}

fn log_round(round: &RoundResult, baseline: &Baseline) {
    match round.first_failure() {
        None => info!(
            level = round.level(),
            elapsed_ms = round.elapsed().as_millis() as u64,
            "All {} concurrent fetches matched the {}-byte baseline",
            round.level(),
            baseline.len()
        ),
        Some(first) => warn!(
            level = round.level(),
            failed = round.failed_count(),
            "{} of {} concurrent fetches failed; first at index {}: {}",
            round.failed_count(),
            round.level(),
            first.index,
            first
                .reason
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_default()
        ),
    }
}
