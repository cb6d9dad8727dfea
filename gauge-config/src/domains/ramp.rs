//! Capacity ramp configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Linear concurrency ramp configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RampConfig {
    /// First concurrency level probed
    #[serde(default = "default_start_level")]
    pub start_level: usize,

    /// Increment between levels
    #[serde(default = "default_step")]
    pub step: usize,

    /// Highest level that may be probed; exceeding it aborts the ramp
    #[serde(default = "default_max_level")]
    pub max_level: usize,

    /// Wall-clock budget for the whole ramp
    #[serde(
        with = "crate::domains::utils::serde_duration_option",
        default = "default_max_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_duration: Option<Duration>,

    /// Upper bound on how long a round waits for any single fetch
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_round_timeout"
    )]
    pub round_timeout: Duration,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            start_level: default_start_level(),
            step: default_step(),
            max_level: default_max_level(),
            max_duration: default_max_duration(),
            round_timeout: default_round_timeout(),
        }
    }
}

impl Validatable for RampConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.start_level, "start_level", self.domain_name())?;
        validate_positive(self.step, "step", self.domain_name())?;
        validate_positive(
            self.round_timeout.as_secs(),
            "round_timeout",
            self.domain_name(),
        )?;

        if self.max_level < self.start_level {
            return Err(self.validation_error(format!(
                "max_level ({}) must be at least start_level ({})",
                self.max_level, self.start_level
            )));
        }

        if let Some(budget) = self.max_duration {
            validate_positive(budget.as_secs(), "max_duration", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "ramp"
    }
}

fn default_start_level() -> usize {
    20
}

fn default_step() -> usize {
    10
}

fn default_max_level() -> usize {
    1000
}

fn default_max_duration() -> Option<Duration> {
    Some(Duration::from_secs(600))
}

fn default_round_timeout() -> Duration {
    Duration::from_secs(60)
}
