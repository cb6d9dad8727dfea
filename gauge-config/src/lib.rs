//! Domain-driven configuration management for proxy-gauge
//!
//! Configuration is split by functional domain (proxy target, HTTP client,
//! endpoints, sampling, capacity ramp, conformance, logging), each with its
//! own defaults and validation, and can be loaded from YAML with
//! `PROXY_GAUGE_*` environment overrides.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    conformance::ConformanceConfig,
    endpoints::{EndpointConfig, EndpointsConfig, TransferClass},
    http::HttpConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    proxy::ProxyConfig,
    ramp::RampConfig,
    sampling::SamplingConfig,
    GaugeConfig,
};

// Re-export utilities
pub use domains::utils::{serde_duration, serde_duration_option};
