//! Proxy-under-test configuration

use crate::error::ConfigResult;
use crate::validation::{validate_port_range, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};

/// Host and port of the forward proxy being measured
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy host name or address
    #[serde(default = "default_host")]
    pub host: String,

    /// Proxy port. Zero means "not supplied" and fails validation.
    #[serde(default)]
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
        }
    }
}

impl Validatable for ProxyConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.host, "host", self.domain_name())?;

        if self.port == 0 {
            return Err(self.validation_error(
                "port must be supplied (--proxy-port or PROXY_GAUGE_PROXY_PORT)",
            ));
        }
        validate_port_range(self.port, "port", self.domain_name())
    }

    fn domain_name(&self) -> &'static str {
        "proxy"
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
