//! Byte-fidelity conformance check configuration

use crate::domains::endpoints::{EndpointConfig, TransferClass};
use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Single-request correctness checks run against the proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConformanceConfig {
    /// Whether the suite runs as part of `run`
    #[serde(default = "crate::domains::utils::default_true")]
    pub enabled: bool,

    /// Text document compared byte for byte
    #[serde(default = "default_text")]
    pub text: EndpointConfig,

    /// Binary (image) payload compared byte for byte
    #[serde(default = "default_binary")]
    pub binary: EndpointConfig,

    /// Cacheable resource fetched cold then warm
    #[serde(default = "default_cache")]
    pub cache: EndpointConfig,
}

impl Default for ConformanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            text: default_text(),
            binary: default_binary(),
            cache: default_cache(),
        }
    }
}

impl Validatable for ConformanceConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !self.enabled {
            return Ok(());
        }
        self.text.validate_as("text", self.domain_name())?;
        self.binary.validate_as("binary", self.domain_name())?;
        self.cache.validate_as("cache", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "conformance"
    }
}

fn default_text() -> EndpointConfig {
    EndpointConfig::new(
        "http://www.cs.cmu.edu/~prs/bio.html",
        TransferClass::Small,
        "text/html",
    )
}

fn default_binary() -> EndpointConfig {
    EndpointConfig::new(
        "http://www.arcanedomain.com/Noahhead.jpg",
        TransferClass::Small,
        "image/jpeg",
    )
}

fn default_cache() -> EndpointConfig {
    EndpointConfig::new("http://portquiz.net:8080/", TransferClass::Small, "text/html")
}
