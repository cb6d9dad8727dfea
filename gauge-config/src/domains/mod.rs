//! Domain-specific configuration modules

pub mod conformance;
pub mod endpoints;
pub mod http;
pub mod logging;
pub mod proxy;
pub mod ramp;
pub mod sampling;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main proxy-gauge configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GaugeConfig {
    /// Proxy under test
    #[serde(default)]
    pub proxy: proxy::ProxyConfig,

    /// HTTP client configuration
    #[serde(default)]
    pub http: http::HttpConfig,

    /// Latency and capacity endpoints
    #[serde(default)]
    pub endpoints: endpoints::EndpointsConfig,

    /// Latency sampling configuration
    #[serde(default)]
    pub sampling: sampling::SamplingConfig,

    /// Capacity ramp configuration
    #[serde(default)]
    pub ramp: ramp::RampConfig,

    /// Byte-fidelity conformance checks
    #[serde(default)]
    pub conformance: conformance::ConformanceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl GaugeConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.proxy.validate()?;
        self.http.validate()?;
        self.endpoints.validate()?;
        self.sampling.validate()?;
        self.ramp.validate()?;
        self.conformance.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = GaugeConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
