//! Client settings shared by the direct and proxied routes

use gauge_config::HttpConfig as ConfigHttpConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings applied identically to both clients so that the only difference
/// between a direct and a proxied fetch is the proxy itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Bound on one fetch, body included; also reported in timeout errors
    pub timeout: Duration,

    pub connect_timeout: Duration,

    /// Redirect hops followed before giving up
    pub max_redirects: u32,

    pub user_agent: String,

    /// `false` accepts invalid certificates on https endpoints
    pub verify_ssl: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        ConfigHttpConfig::default().into()
    }
}

impl From<ConfigHttpConfig> for HttpConfig {
    fn from(config: ConfigHttpConfig) -> Self {
        let ConfigHttpConfig {
            timeout,
            connect_timeout,
            max_redirects,
            user_agent,
            verify_ssl,
        } = config;
        Self {
            timeout,
            connect_timeout,
            max_redirects,
            user_agent,
            verify_ssl,
        }
    }
}
