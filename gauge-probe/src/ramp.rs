//! Linear capacity ramp over concurrency levels

use crate::error::ProbeError;
use crate::prober::{ConcurrencyProber, RoundResult};
use crate::verify::VerificationOutcome;
use gauge_config::RampConfig;
use gauge_http::Endpoint;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Start level, step and the safety bounds that guarantee termination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampPolicy {
    pub start_level: usize,
    pub step: usize,
    /// Highest level that may be probed
    pub max_level: usize,
    /// Wall-clock budget checked before each round
    pub max_duration: Option<Duration>,
}

impl RampPolicy {
    pub fn new(start_level: usize, step: usize, max_level: usize) -> Self {
        Self {
            start_level,
            step,
            max_level,
            max_duration: None,
        }
    }

    pub fn with_max_duration(mut self, budget: Duration) -> Self {
        self.max_duration = Some(budget);
        self
    }

    /// State after a round at `level` finished with the given verdict.
    /// A step that cannot move past `level` (zero or overflowing) ends the
    /// ramp at the ceiling instead of re-probing the same level.
    pub fn transition(&self, level: usize, all_passed: bool) -> RampState {
        if !all_passed {
            return RampState::Found;
        }
        match level.checked_add(self.step).filter(|&next| next > level) {
            Some(next) => RampState::Ramping { level: next },
            None => RampState::Aborted(AbortReason::CeilingExceeded {
                ceiling: self.max_level,
            }),
        }
    }

    /// Whether `level` may be probed given the bounds and time already spent
    fn admit(&self, level: usize, elapsed: Duration) -> Option<AbortReason> {
        if level > self.max_level {
            return Some(AbortReason::CeilingExceeded {
                ceiling: self.max_level,
            });
        }
        match self.max_duration {
            Some(budget) if elapsed >= budget => Some(AbortReason::BudgetExhausted { budget }),
            _ => None,
        }
    }
}

impl From<&RampConfig> for RampPolicy {
    fn from(config: &RampConfig) -> Self {
        Self {
            start_level: config.start_level,
            step: config.step,
            max_level: config.max_level,
            max_duration: config.max_duration,
        }
    }
}

/// Ramp controller state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RampState {
    Ramping { level: usize },
    /// A round failed: capacity measured
    Found,
    /// Stopped without finding a failure
    Aborted(AbortReason),
}

impl RampState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RampState::Ramping { .. })
    }
}

/// Why a ramp stopped without finding a breaking level
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// Every level up to the ceiling passed: capacity exceeds the ceiling
    CeilingExceeded { ceiling: usize },
    BudgetExhausted {
        #[serde(rename = "budget_secs", serialize_with = "crate::serde_secs::serialize")]
        budget: Duration,
    },
    /// The direct reference fetch failed, so the round could not be judged
    BaselineUnavailable { level: usize, reason: String },
}

/// Last good and first bad concurrency level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CapacityMeasurement {
    /// Highest level that passed before the first failure; 0 if the first
    /// level failed
    pub max_sustained_level: usize,
    pub breaking_level: Option<usize>,
    /// Lowest failing ordinal in the breaking round
    pub first_failure_index: Option<usize>,
}

impl CapacityMeasurement {
    /// Scan rounds in probe order for the first failure; the round before it
    /// is the last sustained level.
    pub fn from_rounds(rounds: &[RoundResult]) -> Self {
        match rounds.iter().position(|round| !round.all_passed()) {
            Some(breaking) => Self {
                max_sustained_level: breaking
                    .checked_sub(1)
                    .map(|previous| rounds[previous].level())
                    .unwrap_or(0),
                breaking_level: Some(rounds[breaking].level()),
                first_failure_index: rounds[breaking].first_failure().map(|o| o.index),
            },
            None => Self {
                max_sustained_level: rounds.last().map(|r| r.level()).unwrap_or(0),
                breaking_level: None,
                first_failure_index: None,
            },
        }
    }
}

/// Compact per-round record kept in the report
#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub level: usize,
    pub passed: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_failure: Option<VerificationOutcome>,
    #[serde(rename = "elapsed_secs", serialize_with = "crate::serde_secs::serialize")]
    pub elapsed: Duration,
}

impl From<&RoundResult> for RoundSummary {
    fn from(round: &RoundResult) -> Self {
        Self {
            level: round.level(),
            passed: round.passed_count(),
            failed: round.failed_count(),
            first_failure: round.first_failure().cloned(),
            elapsed: round.elapsed(),
        }
    }
}

/// Final output of a ramp
#[derive(Debug, Clone, Serialize)]
pub struct CapacityReport {
    pub endpoint: String,
    /// Terminal state: `Found` or `Aborted`
    pub state: RampState,
    pub measurement: CapacityMeasurement,
    pub rounds: Vec<RoundSummary>,
    /// Full outcomes of the failing round, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breaking_round: Option<RoundResult>,
    #[serde(rename = "elapsed_secs", serialize_with = "crate::serde_secs::serialize")]
    pub elapsed: Duration,
}

impl CapacityReport {
    pub fn levels(&self) -> Vec<usize> {
        self.rounds.iter().map(|round| round.level).collect()
    }
}

/// Drives the prober across increasing levels until a round fails or a bound
/// is hit. Strictly sequential: one level at a time, never revisited.
pub struct CapacityRamp {
    prober: ConcurrencyProber,
    policy: RampPolicy,
}

impl CapacityRamp {
    pub fn new(prober: ConcurrencyProber, policy: RampPolicy) -> Self {
        Self { prober, policy }
    }

    pub fn policy(&self) -> &RampPolicy {
        &self.policy
    }

    pub async fn run(&self, endpoint: &Endpoint) -> CapacityReport {
        let start = Instant::now();
        let mut rounds: Vec<RoundResult> = Vec::new();
        let mut state = RampState::Ramping {
            level: self.policy.start_level.max(1),
        };

        info!(
            "Ramping concurrency against {} from {} in steps of {} (ceiling {})",
            endpoint, self.policy.start_level, self.policy.step, self.policy.max_level
        );

        while let RampState::Ramping { level } = state {
            if let Some(reason) = self.policy.admit(level, start.elapsed()) {
                state = RampState::Aborted(reason);
                break;
            }

            debug_assert!(rounds.last().map_or(true, |r| r.level() < level));

            state = match self.prober.probe(endpoint, level).await {
                Ok(round) => {
                    let next = self.policy.transition(level, round.all_passed());
                    rounds.push(round);
                    next
                }
                Err(ProbeError::Baseline { reason, .. }) => {
                    RampState::Aborted(AbortReason::BaselineUnavailable {
                        level,
                        reason: reason.to_string(),
                    })
                }
            };
        }

        let measurement = CapacityMeasurement::from_rounds(&rounds);
        match state {
            RampState::Found => info!(
                "Capacity found: sustained {} concurrent clients, failed at {:?}",
                measurement.max_sustained_level, measurement.breaking_level
            ),
            ref aborted => warn!(
                "Ramp stopped without a failure ({:?}); sustained at least {}",
                aborted, measurement.max_sustained_level
            ),
        }

        CapacityReport {
            endpoint: endpoint.url.to_string(),
            breaking_round: rounds.iter().find(|round| !round.all_passed()).cloned(),
            rounds: rounds.iter().map(RoundSummary::from).collect(),
            state,
            measurement,
            elapsed: start.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fault, ScriptedFetcher};
    use gauge_http::{FetchError, TransferClass};
    use std::sync::Arc;

    fn endpoint() -> Endpoint {
        Endpoint::parse("http://origin.test/comp/160/", TransferClass::Small, "text/html").unwrap()
    }

    fn ramp(fetcher: Arc<ScriptedFetcher>, policy: RampPolicy) -> CapacityRamp {
        CapacityRamp::new(ConcurrencyProber::new(fetcher, Duration::from_secs(5)), policy)
    }

    /// Proxy that corrupts responses once more than `limit` clients are connected
    fn proxy_with_limit(limit: usize) -> Arc<ScriptedFetcher> {
        Arc::new(
            ScriptedFetcher::new("<html>comp 160</html>")
                .with_fault(Fault::CorruptBeyond { limit, offset: 3 }),
        )
    }

    #[tokio::test]
    async fn test_finds_last_good_first_bad_pair() {
        let fetcher = proxy_with_limit(45);
        let report = ramp(fetcher.clone(), RampPolicy::new(20, 10, 1000)).run(&endpoint()).await;

        assert_eq!(report.state, RampState::Found);
        assert_eq!(
            report.measurement,
            CapacityMeasurement {
                max_sustained_level: 40,
                breaking_level: Some(50),
                first_failure_index: report.breaking_round.as_ref().and_then(|r| r.first_failure()).map(|o| o.index),
            }
        );
        assert_eq!(report.levels(), vec![20, 30, 40, 50]);
        assert_eq!(fetcher.rounds(), vec![20, 30, 40, 50]);
    }

    #[tokio::test]
    async fn test_first_level_failure_sustains_zero() {
        let fetcher = Arc::new(ScriptedFetcher::new("page").with_fault(Fault::FailBeyond {
            limit: 0,
            error: FetchError::Connect("connection refused".into()),
        }));
        let report = ramp(fetcher, RampPolicy::new(20, 10, 1000)).run(&endpoint()).await;

        assert_eq!(report.state, RampState::Found);
        assert_eq!(report.measurement.max_sustained_level, 0);
        assert_eq!(report.measurement.breaking_level, Some(20));
        // Every slot failed, so the lowest ordinal is reported
        assert_eq!(report.measurement.first_failure_index, Some(0));
    }

    #[tokio::test]
    async fn test_levels_strictly_increase_and_stay_below_break() {
        let fetcher = proxy_with_limit(77);
        let report = ramp(fetcher, RampPolicy::new(5, 7, 1000)).run(&endpoint()).await;

        let levels = report.levels();
        assert!(levels.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(levels.windows(2).all(|pair| pair[1] - pair[0] == 7));
        let measurement = report.measurement;
        assert!(measurement.max_sustained_level < measurement.breaking_level.unwrap());
        assert_eq!(measurement.max_sustained_level, 75);
        assert_eq!(measurement.breaking_level, Some(82));
    }

    #[tokio::test]
    async fn test_ceiling_aborts_with_same_lower_bound_each_time() {
        let policy = RampPolicy::new(20, 10, 60);

        let mut bounds = Vec::new();
        for _ in 0..2 {
            let fetcher = Arc::new(ScriptedFetcher::new("healthy proxy"));
            let report = ramp(fetcher, policy.clone()).run(&endpoint()).await;

            assert_eq!(
                report.state,
                RampState::Aborted(AbortReason::CeilingExceeded { ceiling: 60 })
            );
            assert_eq!(report.measurement.breaking_level, None);
            assert!(report.breaking_round.is_none());
            bounds.push(report.measurement.max_sustained_level);
        }
        assert_eq!(bounds, vec![60, 60]);
    }

    #[tokio::test]
    async fn test_ceiling_off_the_step_grid_is_never_exceeded() {
        let fetcher = Arc::new(ScriptedFetcher::new("healthy proxy"));
        let report = ramp(fetcher.clone(), RampPolicy::new(20, 10, 45)).run(&endpoint()).await;

        assert_eq!(report.levels(), vec![20, 30, 40]);
        assert_eq!(report.measurement.max_sustained_level, 40);
        assert!(fetcher.rounds().iter().all(|&n| n <= 45));
    }

    #[tokio::test]
    async fn test_exhausted_budget_aborts_before_probing() {
        let fetcher = Arc::new(ScriptedFetcher::new("page"));
        let policy = RampPolicy::new(20, 10, 1000).with_max_duration(Duration::ZERO);
        let report = ramp(fetcher.clone(), policy).run(&endpoint()).await;

        assert_eq!(
            report.state,
            RampState::Aborted(AbortReason::BudgetExhausted {
                budget: Duration::ZERO
            })
        );
        assert!(report.rounds.is_empty());
        assert_eq!(fetcher.direct_calls(), 0);
    }

    #[tokio::test]
    async fn test_baseline_failure_aborts_without_blaming_proxy() {
        let fetcher = Arc::new(
            ScriptedFetcher::new("page").fail_direct(FetchError::Connect("origin down".into())),
        );
        let report = ramp(fetcher, RampPolicy::new(20, 10, 1000)).run(&endpoint()).await;

        assert!(matches!(
            report.state,
            RampState::Aborted(AbortReason::BaselineUnavailable { level: 20, .. })
        ));
        assert_eq!(report.measurement, CapacityMeasurement::default());
    }

    #[test]
    fn test_transition_table() {
        let policy = RampPolicy::new(20, 10, 100);
        assert_eq!(policy.transition(20, true), RampState::Ramping { level: 30 });
        assert_eq!(policy.transition(20, false), RampState::Found);
        assert!(policy.transition(usize::MAX, true).is_terminal());
        assert!(RampPolicy::new(20, 0, 100).transition(20, true).is_terminal());
        assert!(!RampState::Ramping { level: 1 }.is_terminal());
    }

    #[tokio::test]
    async fn test_zero_step_probes_each_level_once() {
        let fetcher = Arc::new(ScriptedFetcher::new("healthy proxy"));
        let policy = RampPolicy::new(20, 0, 1000);
        let report = ramp(fetcher.clone(), policy).run(&endpoint()).await;

        assert_eq!(report.levels(), vec![20]);
        assert_eq!(fetcher.rounds(), vec![20]);
        assert_eq!(
            report.state,
            RampState::Aborted(AbortReason::CeilingExceeded { ceiling: 1000 })
        );
        assert_eq!(report.measurement.max_sustained_level, 20);
    }

    #[tokio::test]
    async fn test_zero_start_level_begins_at_one() {
        let fetcher = Arc::new(ScriptedFetcher::new("healthy proxy"));
        let report = ramp(fetcher, RampPolicy::new(0, 5, 11)).run(&endpoint()).await;
        assert_eq!(report.levels(), vec![1, 6, 11]);
    }

    #[tokio::test]
    async fn test_aborted_reports_serialize() {
        let healthy = Arc::new(ScriptedFetcher::new("healthy proxy"));
        let ceiling = ramp(healthy.clone(), RampPolicy::new(10, 10, 20)).run(&endpoint()).await;
        let budget = ramp(
            healthy,
            RampPolicy::new(10, 10, 20).with_max_duration(Duration::ZERO),
        )
        .run(&endpoint())
        .await;
        let origin_down = Arc::new(
            ScriptedFetcher::new("page").fail_direct(FetchError::Connect("origin down".into())),
        );
        let baseline = ramp(origin_down, RampPolicy::new(10, 10, 20)).run(&endpoint()).await;

        let ceiling = serde_json::to_value(&ceiling).unwrap();
        assert_eq!(ceiling["state"]["state"], "aborted");
        assert_eq!(ceiling["state"]["kind"], "ceiling_exceeded");
        assert_eq!(ceiling["state"]["ceiling"], 20);

        let budget = serde_json::to_value(&budget).unwrap();
        assert_eq!(budget["state"]["kind"], "budget_exhausted");
        assert_eq!(budget["state"]["budget_secs"], 0.0);

        let baseline = serde_json::to_value(&baseline).unwrap();
        assert_eq!(baseline["state"]["kind"], "baseline_unavailable");
        assert_eq!(baseline["state"]["level"], 10);
        assert!(baseline["state"]["reason"].as_str().unwrap().contains("origin down"));
    }

    #[test]
    fn test_measurement_from_empty_rounds() {
        assert_eq!(CapacityMeasurement::from_rounds(&[]), CapacityMeasurement::default());
    }
}
