//! Configuration loading and environment variable handling

use crate::domains::GaugeConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "PROXY_GAUGE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<GaugeConfig> {
        self.from_file_with(path, |_| {})
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<GaugeConfig> {
        self.from_env_with(|_| {})
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<GaugeConfig> {
        self.load_with(config_path, |_| {})
    }

    /// Load configuration, then apply caller overrides (command-line flags)
    /// on top of file and environment values before validating.
    pub fn load_with<F>(
        &self,
        config_path: Option<impl AsRef<Path>>,
        overrides: F,
    ) -> ConfigResult<GaugeConfig>
    where
        F: FnOnce(&mut GaugeConfig),
    {
        match config_path {
            Some(path) => self.from_file_with(path, overrides),
            None => self.from_env_with(overrides),
        }
    }

    fn from_file_with<F>(&self, path: impl AsRef<Path>, overrides: F) -> ConfigResult<GaugeConfig>
    where
        F: FnOnce(&mut GaugeConfig),
    {
        let content = std::fs::read_to_string(path)?;
        let config: GaugeConfig = serde_yaml::from_str(&content)?;
        self.finish(config, overrides)
    }

    fn from_env_with<F>(&self, overrides: F) -> ConfigResult<GaugeConfig>
    where
        F: FnOnce(&mut GaugeConfig),
    {
        self.finish(GaugeConfig::default(), overrides)
    }

    fn finish<F>(&self, mut config: GaugeConfig, overrides: F) -> ConfigResult<GaugeConfig>
    where
        F: FnOnce(&mut GaugeConfig),
    {
        self.apply_env_overrides(&mut config)?;
        overrides(&mut config);
        config.validate_all()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut GaugeConfig) -> ConfigResult<()> {
        self.apply_proxy_overrides(&mut config.proxy)?;
        self.apply_http_overrides(&mut config.http)?;
        self.apply_sampling_overrides(&mut config.sampling)?;
        self.apply_ramp_overrides(&mut config.ramp)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    fn apply_proxy_overrides(
        &self,
        config: &mut crate::domains::proxy::ProxyConfig,
    ) -> ConfigResult<()> {
        if let Ok(host) = self.get_env_var("PROXY_HOST") {
            config.host = host;
        }

        if let Some(port) = self.parse_env_var("PROXY_PORT")? {
            config.port = port;
        }

        Ok(())
    }

    fn apply_http_overrides(
        &self,
        config: &mut crate::domains::http::HttpConfig,
    ) -> ConfigResult<()> {
        let timeout = self.parse_env_var::<u64>("HTTP_TIMEOUT")?.map(Duration::from_secs);
        let connect_timeout = self
            .parse_env_var::<u64>("HTTP_CONNECT_TIMEOUT")?
            .map(Duration::from_secs);

        if let Some(timeout) = timeout {
            config.timeout = timeout;
        }
        match connect_timeout {
            Some(connect_timeout) => config.connect_timeout = connect_timeout,
            // A lone timeout override also caps the connect phase
            None if timeout.is_some() => {
                config.connect_timeout = config.connect_timeout.min(config.timeout)
            }
            None => {}
        }

        if let Ok(user_agent) = self.get_env_var("HTTP_USER_AGENT") {
            config.user_agent = user_agent;
        }

        if let Some(verify_ssl) = self.parse_env_var("HTTP_VERIFY_SSL")? {
            config.verify_ssl = verify_ssl;
        }

        Ok(())
    }

    fn apply_sampling_overrides(
        &self,
        config: &mut crate::domains::sampling::SamplingConfig,
    ) -> ConfigResult<()> {
        if let Some(runs) = self.parse_env_var("SAMPLE_RUNS")? {
            config.repetitions = runs;
        }
        Ok(())
    }

    fn apply_ramp_overrides(
        &self,
        config: &mut crate::domains::ramp::RampConfig,
    ) -> ConfigResult<()> {
        if let Some(start) = self.parse_env_var("RAMP_START")? {
            config.start_level = start;
        }

        if let Some(step) = self.parse_env_var("RAMP_STEP")? {
            config.step = step;
        }

        if let Some(max_level) = self.parse_env_var("RAMP_MAX_LEVEL")? {
            config.max_level = max_level;
        }

        if let Some(seconds) = self.parse_env_var::<u64>("RAMP_MAX_SECONDS")? {
            // 0 disables the wall-clock budget
            config.max_duration = (seconds > 0).then(|| Duration::from_secs(seconds));
        }

        Ok(())
    }

    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Parse an optional environment variable, failing on malformed values
    fn parse_env_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e))),
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
