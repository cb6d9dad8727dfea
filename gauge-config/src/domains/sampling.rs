//! Latency sampling configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};

/// Latency sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Sequential fetches per route (direct and proxied)
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            repetitions: default_repetitions(),
        }
    }
}

impl Validatable for SamplingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.repetitions, "repetitions", self.domain_name())
    }

    fn domain_name(&self) -> &'static str {
        "sampling"
    }
}

fn default_repetitions() -> u32 {
    20
}
