use anyhow::{anyhow, Context, Result};
use clap::Parser;
use gauge_config::{ConfigLoader, GaugeConfig, LogFormat, LoggingConfig};
use gauge_probe::{Harness, HarnessSteps};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod cli;
mod render;

use cli::{Cli, Commands, ConfigCommands, ConfigFormat, OutputArgs, Overrides};

/// Load configuration from file or environment, then apply command-line overrides
fn load_config(config_path: Option<&PathBuf>, overrides: &Overrides) -> Result<GaugeConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => loader
            .load_with(Some(path), |config| overrides.apply(config))
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => loader
            .load_with(None::<&Path>, |config| overrides.apply(config))
            .context("Failed to load configuration from environment"),
    }
}

/// Initialize tracing on stderr so stdout carries only the report.
///
/// Filter precedence: `--log-level`, then `RUST_LOG`, then the configured level.
fn init_tracing(logging: &LoggingConfig, log_level: Option<&str>) -> Result<()> {
    let env_filter = match log_level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level '{}'", level))?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str())),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    let result = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    result.map_err(|e| anyhow!("Failed to initialize tracing: {}", e))?;

    debug!("Tracing initialized");
    Ok(())
}

/// Run the selected benchmark steps and print the report
async fn benchmark_command(
    cli: &Cli,
    overrides: Overrides,
    steps: HarnessSteps,
    output: &OutputArgs,
) -> Result<()> {
    let config = load_config(cli.config.as_ref(), &overrides)?;
    init_tracing(&config.logging, cli.log_level.as_deref())?;

    let harness = Harness::from_config(&config).context("Failed to prepare benchmark")?;
    info!("Benchmarking proxy {}", harness.plan().proxy);

    let report = harness.run(steps).await.context("Benchmark aborted")?;
    println!("{}", render::render(&report, output.format)?);
    Ok(())
}

/// Handle configuration validation
fn handle_config_validate(config_file: &PathBuf) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow!("Configuration file not found: {:?}", config_file));
    }

    load_config(Some(config_file), &Overrides::default())?;
    println!("✅ Configuration file is valid");
    Ok(())
}

/// Write a sample configuration file
fn handle_config_generate(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(output, GaugeConfig::generate_sample())
        .context("Failed to write configuration file")?;

    println!("✅ Sample configuration generated at: {:?}", output);
    println!("📝 Set proxy.port (and proxy.host) before running a benchmark");
    println!(
        "🔧 Validate with: proxy-gauge config validate --config-file {:?}",
        output
    );
    Ok(())
}

/// Print the effective configuration without validating it
fn handle_config_show(config_file: Option<&PathBuf>, format: ConfigFormat) -> Result<()> {
    let config = match config_file {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read configuration from {:?}", path))?;
            serde_yaml::from_str::<GaugeConfig>(&content)
                .with_context(|| format!("Failed to parse configuration from {:?}", path))?
        }
        None => GaugeConfig::default(),
    };

    let output = match format {
        ConfigFormat::Yaml => {
            serde_yaml::to_string(&config).context("Failed to serialize to YAML")?
        }
        ConfigFormat::Json => {
            serde_json::to_string_pretty(&config).context("Failed to serialize to JSON")?
        }
    };
    println!("{}", output);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            ref target,
            ref sampling,
            ref ramp,
            ref output,
        }) => {
            let overrides = Overrides {
                target: target.clone(),
                sampling: sampling.clone(),
                ramp: ramp.clone(),
            };
            benchmark_command(&cli, overrides, HarnessSteps::all(), output).await
        }
        Some(Commands::Latency {
            ref target,
            ref sampling,
            ref output,
        }) => {
            let overrides = Overrides {
                target: target.clone(),
                sampling: sampling.clone(),
                ..Default::default()
            };
            benchmark_command(&cli, overrides, HarnessSteps::latency_only(), output).await
        }
        Some(Commands::Capacity {
            ref target,
            ref ramp,
            ref output,
        }) => {
            let overrides = Overrides {
                target: target.clone(),
                ramp: ramp.clone(),
                ..Default::default()
            };
            benchmark_command(&cli, overrides, HarnessSteps::capacity_only(), output).await
        }
        Some(Commands::Conformance {
            ref target,
            ref output,
        }) => {
            let overrides = Overrides {
                target: target.clone(),
                ..Default::default()
            };
            benchmark_command(&cli, overrides, HarnessSteps::conformance_only(), output).await
        }
        Some(Commands::Config { ref config_cmd }) => {
            init_tracing(&LoggingConfig::default(), cli.log_level.as_deref())?;
            match config_cmd {
                ConfigCommands::Validate { config_file } => handle_config_validate(config_file),
                ConfigCommands::Generate { output, force } => {
                    handle_config_generate(output, *force)
                }
                ConfigCommands::Show {
                    config_file,
                    format,
                } => handle_config_show(config_file.as_ref().or(cli.config.as_ref()), *format),
            }
        }
        None => {
            // If no subcommand is provided, print help
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().context("Failed to print help")?;
            println!();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_generated_sample_fails_validation_until_port_is_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gauge.yaml");

        handle_config_generate(&path, false).unwrap();
        assert!(handle_config_generate(&path, false).is_err());
        assert!(handle_config_generate(&path, true).is_ok());

        let overrides = Overrides {
            target: cli::TargetArgs {
                proxy_host: None,
                proxy_port: Some(3128),
            },
            ..Default::default()
        };
        assert!(load_config(Some(&path), &Overrides::default()).is_err());
        let config = load_config(Some(&path), &overrides).unwrap();
        assert_eq!(config.proxy.port, 3128);
    }

    #[test]
    fn test_validate_rejects_missing_file() {
        let missing = PathBuf::from("/nonexistent/proxy-gauge.yaml");
        assert!(handle_config_validate(&missing).is_err());
    }

    #[test]
    fn test_show_reads_file_without_validating() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "proxy:\n  host: proxy.local\n").unwrap();
        let path = file.path().to_path_buf();

        assert!(handle_config_show(Some(&path), ConfigFormat::Json).is_ok());
    }
}
