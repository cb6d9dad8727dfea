//! Endpoint table for latency sampling and capacity probing

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transfer-size class of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferClass {
    Small,
    Large,
}

impl TransferClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferClass::Small => "small",
            TransferClass::Large => "large",
        }
    }
}

impl fmt::Display for TransferClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single target resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Absolute http(s) URL
    pub url: String,

    /// Size class, used to label the measurement
    pub transfer_class: TransferClass,

    /// Expected MIME type of the payload
    pub content_type: String,
}

impl EndpointConfig {
    pub fn new(
        url: impl Into<String>,
        transfer_class: TransferClass,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            transfer_class,
            content_type: content_type.into(),
        }
    }

    /// Validate under a named field, e.g. `endpoints.small`
    pub fn validate_as(&self, field_name: &str, domain: &str) -> ConfigResult<()> {
        validate_url(&self.url, &format!("{}.url", field_name), domain)?;
        validate_required_string(
            &self.content_type,
            &format!("{}.content_type", field_name),
            domain,
        )
    }
}

/// The fixed endpoint table used by a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Small transfer used for latency sampling (~50 bytes)
    #[serde(default = "default_small")]
    pub small: EndpointConfig,

    /// Large transfer used for throughput sampling (~20 MB)
    #[serde(default = "default_large")]
    pub large: EndpointConfig,

    /// Page fetched concurrently by the capacity ramp
    #[serde(default = "default_capacity")]
    pub capacity: EndpointConfig,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            small: default_small(),
            large: default_large(),
            capacity: default_capacity(),
        }
    }
}

impl Validatable for EndpointsConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.small.validate_as("small", self.domain_name())?;
        self.large.validate_as("large", self.domain_name())?;
        self.capacity.validate_as("capacity", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "endpoints"
    }
}

fn default_small() -> EndpointConfig {
    EndpointConfig::new("http://portquiz.net:8080/", TransferClass::Small, "text/html")
}

fn default_large() -> EndpointConfig {
    EndpointConfig::new(
        "https://www.hq.nasa.gov/alsj/a17/A17_FlightPlan.pdf",
        TransferClass::Large,
        "application/pdf",
    )
}

fn default_capacity() -> EndpointConfig {
    EndpointConfig::new(
        "http://www.cs.tufts.edu/comp/160/",
        TransferClass::Small,
        "text/html",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_validation() {
        let mut endpoints = EndpointsConfig::default();
        assert!(endpoints.validate().is_ok());

        endpoints.capacity.url = "www.cs.tufts.edu/comp/160/".to_string();
        match endpoints.validate() {
            Err(crate::ConfigError::DomainError { domain, message }) => {
                assert_eq!(domain, "endpoints");
                assert!(message.contains("capacity.url"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_transfer_class_serde() {
        let yaml = "url: http://example.com/\ntransfer_class: large\ncontent_type: image/jpeg\n";
        let endpoint: EndpointConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(endpoint.transfer_class, TransferClass::Large);
        assert_eq!(endpoint.transfer_class.to_string(), "large");
    }
}
