//! CLI argument parsing definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use gauge_config::GaugeConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Measure latency, response fidelity and concurrent capacity of an HTTP forward proxy
#[derive(Parser)]
#[command(name = "proxy-gauge", author, version, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error); overrides RUST_LOG
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every benchmark: latency, conformance and capacity
    Run {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        sampling: SamplingArgs,

        #[command(flatten)]
        ramp: RampArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Compare direct and proxied latency and throughput
    Latency {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        sampling: SamplingArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Ramp concurrent clients until the proxy corrupts or drops a response
    Capacity {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        ramp: RampArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Check text, binary and cache fidelity through the proxy
    Conformance {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration (file, environment and defaults)
    Show {
        /// Path to configuration file (optional, uses default loading logic)
        #[arg(long, value_name = "PATH")]
        config_file: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = ConfigFormat::Yaml)]
        format: ConfigFormat,
    },
}

/// The proxy under test
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Proxy host name or address
    #[arg(long, value_name = "HOST")]
    pub proxy_host: Option<String>,

    /// Proxy port
    #[arg(long, value_name = "PORT")]
    pub proxy_port: Option<u16>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SamplingArgs {
    /// Sequential fetches per route when sampling latency
    #[arg(long, value_name = "N")]
    pub runs: Option<u32>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RampArgs {
    /// First concurrency level
    #[arg(long, value_name = "N")]
    pub start_level: Option<usize>,

    /// Clients added per round
    #[arg(long, value_name = "N")]
    pub step: Option<usize>,

    /// Highest concurrency level to probe
    #[arg(long, value_name = "N")]
    pub max_level: Option<usize>,

    /// Wall-clock budget for the ramp in seconds (0 disables it)
    #[arg(long, value_name = "SECONDS")]
    pub max_seconds: Option<u64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

/// Command-line values that take precedence over file and environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub target: TargetArgs,
    pub sampling: SamplingArgs,
    pub ramp: RampArgs,
}

impl Overrides {
    pub fn apply(&self, config: &mut GaugeConfig) {
        if let Some(ref host) = self.target.proxy_host {
            config.proxy.host = host.clone();
        }
        if let Some(port) = self.target.proxy_port {
            config.proxy.port = port;
        }
        if let Some(runs) = self.sampling.runs {
            config.sampling.repetitions = runs;
        }
        if let Some(start) = self.ramp.start_level {
            config.ramp.start_level = start;
        }
        if let Some(step) = self.ramp.step {
            config.ramp.step = step;
        }
        if let Some(max) = self.ramp.max_level {
            config.ramp.max_level = max;
        }
        if let Some(seconds) = self.ramp.max_seconds {
            config.ramp.max_duration = (seconds > 0).then(|| Duration::from_secs(seconds));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_flags() {
        let cli = Cli::try_parse_from([
            "proxy-gauge",
            "run",
            "--proxy-host",
            "proxy.local",
            "--proxy-port",
            "3128",
            "--runs",
            "5",
            "--max-level",
            "200",
            "--format",
            "json",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Run {
                target,
                sampling,
                ramp,
                output,
            }) => {
                assert_eq!(target.proxy_host.as_deref(), Some("proxy.local"));
                assert_eq!(target.proxy_port, Some(3128));
                assert_eq!(sampling.runs, Some(5));
                assert_eq!(ramp.max_level, Some(200));
                assert_eq!(output.format, OutputFormat::Json);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["proxy-gauge", "latency", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_overrides_apply_only_given_values() {
        let mut config = GaugeConfig::default();
        let overrides = Overrides {
            target: TargetArgs {
                proxy_host: None,
                proxy_port: Some(8080),
            },
            ramp: RampArgs {
                step: Some(5),
                max_seconds: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };

        overrides.apply(&mut config);

        assert_eq!(config.proxy.host, "127.0.0.1");
        assert_eq!(config.proxy.port, 8080);
        assert_eq!(config.ramp.step, 5);
        assert_eq!(config.ramp.start_level, 20);
        assert_eq!(config.ramp.max_duration, None);
        assert_eq!(config.sampling.repetitions, 20);
    }
}
