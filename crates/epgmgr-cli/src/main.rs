//! epgmgr - EPG schedule normalization CLI.

/// Application configuration (TOML).
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use epgmgr_api::mitv::MiTvClient;
use epgmgr_core::{ChannelRegistry, RunOptions, run_all};
use epgmgr_xmltv::{ChannelsFile, XmltvWriter};
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{AppConfig, resolve_config_path};

/// Version string shown by `--version`.
const APP_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (rev:",
    env!("GIT_HASH"),
    ")",
);

/// CLI argument parser.
#[derive(Parser)]
#[command(name = "epgmgr", about, version = APP_VERSION)]
struct Cli {
    /// Override config directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Fetch listings and write the XMLTV guide.
    Generate(GenerateArgs),
    /// Inspect the channel registry.
    Channels(ChannelsCommand),
    /// Manage the config file.
    Config(ConfigCommand),
    /// Print shell completions.
    Completions(CompletionsArgs),
}

/// Arguments for the `generate` subcommand.
#[derive(clap::Args)]
struct GenerateArgs {
    /// Channel registry file (overrides `output.channels_file`).
    #[arg(long)]
    channels: Option<PathBuf>,

    /// XMLTV output file (overrides `output.path`).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Broadcast day cutoff hour, 0-23 (overrides `schedule.cutoff_hour`).
    #[arg(long)]
    cutoff_hour: Option<u32>,

    /// Days before today to fetch (overrides the window start).
    #[arg(long)]
    days_before: Option<u32>,

    /// Days after today to fetch (overrides the window end).
    #[arg(long)]
    days_after: Option<u32>,

    /// Date treated as today, `YYYY-MM-DD` (default: today in site time).
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl GenerateArgs {
    /// Applies command-line overrides on top of the loaded config.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.channels {
            config.output.channels_file.clone_from(path);
        }
        if let Some(path) = &self.output {
            config.output.path.clone_from(path);
        }
        if let Some(hour) = self.cutoff_hour {
            config.schedule.cutoff_hour = hour;
        }
        if let Some(days) = self.days_before {
            config.schedule.date_window[0] = i64::from(days).saturating_neg();
        }
        if let Some(days) = self.days_after {
            config.schedule.date_window[1] = i64::from(days);
        }
    }
}

/// Arguments for the `channels` subcommand.
#[derive(clap::Args)]
struct ChannelsCommand {
    /// Channels subcommand to run.
    #[command(subcommand)]
    command: ChannelsSubcommands,
}

/// Available channels subcommands.
#[derive(Subcommand)]
enum ChannelsSubcommands {
    /// List registry rows.
    List(ChannelsListArgs),
}

/// Arguments for the `channels list` subcommand.
#[derive(clap::Args)]
struct ChannelsListArgs {
    /// Channel registry file (overrides `output.channels_file`).
    #[arg(long)]
    channels: Option<PathBuf>,
}

/// Arguments for the `config` subcommand.
#[derive(clap::Args)]
struct ConfigCommand {
    /// Config subcommand to run.
    #[command(subcommand)]
    command: ConfigSubcommands,
}

/// Available config subcommands.
#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Write a config file with default values.
    Init(ConfigInitArgs),
    /// Show the effective config.
    Show,
}

/// Arguments for the `config init` subcommand.
#[derive(clap::Args)]
struct ConfigInitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    force: bool,
}

/// Arguments for the `completions` subcommand.
#[derive(clap::Args)]
struct CompletionsArgs {
    /// Target shell.
    shell: clap_complete::Shell,
}

/// Loads the config file resolved from `--dir`.
///
/// # Errors
///
/// Returns an error if the path cannot be resolved or the file is invalid.
fn load_config(dir: Option<&PathBuf>) -> Result<AppConfig> {
    let config_path = resolve_config_path(dir).context("failed to resolve config path")?;
    tracing::debug!(path = %config_path.display(), "Loading config");
    AppConfig::load(&config_path).context("failed to load config")
}

/// Builds the mi.tv client from the `[source]` section.
///
/// # Errors
///
/// Returns an error if the base URL is invalid or the client fails to build.
#[instrument(skip_all)]
fn build_mitv_client(config: &AppConfig) -> Result<MiTvClient> {
    let source = &config.source;
    let user_agent = source.user_agent.clone().unwrap_or_else(|| {
        String::from(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
    });

    let mut builder = MiTvClient::builder()
        .user_agent(user_agent)
        .min_interval(source.min_interval());
    if let Some(raw) = &source.base_url {
        let url = raw
            .parse()
            .with_context(|| format!("invalid source.base_url: {raw}"))?;
        builder = builder.base_url(url);
    }
    builder.build().context("failed to build mi.tv client")
}

/// Runs the `generate` subcommand.
///
/// Fetches every channel of the registry, normalizes the timelines and
/// writes the XMLTV document. Individual channel or date failures are
/// reported but do not fail the run.
///
/// # Errors
///
/// Returns an error if the config is invalid, the registry cannot be loaded
/// or the output cannot be written.
#[instrument(skip_all)]
async fn run_generate(args: &GenerateArgs, dir: Option<&PathBuf>) -> Result<()> {
    let mut config = load_config(dir)?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    let settings = config.schedule_settings()?;
    let today = args.date.unwrap_or_else(|| settings.clock.today());
    let dates = config.date_window()?.dates(today)?;
    tracing::info!(
        "Dates: {} .. {} (cutoff {:02}:00, offset {})",
        dates.first().map_or_else(String::new, ToString::to_string),
        dates.last().map_or_else(String::new, ToString::to_string),
        settings.policy.cutoff_hour(),
        settings.clock.offset(),
    );

    let client = build_mitv_client(&config)?;
    let registry = ChannelsFile::new(&config.output.channels_file);
    let mut writer = XmltvWriter::new(config.xmltv_options()?);

    let options = RunOptions {
        dates,
        fetch_timeout: config.source.fetch_timeout(),
        concurrency: config.source.concurrency,
        run_timeout: config.source.run_timeout(),
    };

    let summary = run_all(&client, &registry, &mut writer, &settings, &options)
        .await
        .context("run failed")?;

    writer
        .write_to(&config.output.path)
        .context("failed to write XMLTV output")?;

    for failed in &summary.failed {
        tracing::warn!("{failed}");
    }
    tracing::info!(
        "Wrote {} channels ({} incomplete), {} programmes to {}",
        summary.channels_emitted(),
        summary.channels_incomplete,
        summary.programs,
        config.output.path.display()
    );

    Ok(())
}

/// Runs the `channels list` subcommand.
///
/// # Errors
///
/// Returns an error if the config or the registry cannot be loaded.
#[instrument(skip_all)]
fn run_channels_list(args: &ChannelsListArgs, dir: Option<&PathBuf>) -> Result<()> {
    let config = load_config(dir)?;
    let path = args
        .channels
        .clone()
        .unwrap_or(config.output.channels_file);
    let channels = ChannelsFile::new(path).list_channels()?;

    if channels.is_empty() {
        tracing::info!("No channels in registry.");
        return Ok(());
    }

    tracing::info!("Channels ({}):", channels.len());
    for channel in &channels {
        let status = match channel.validate() {
            Ok(()) => String::new(),
            Err(e) => format!("  [skipped: {e}]"),
        };
        tracing::info!(
            "  {:<24} {:<24} {}{}",
            channel.channel_id,
            channel.channel_ref,
            channel.display_name,
            status
        );
    }

    Ok(())
}

/// Runs the `config init` subcommand.
///
/// # Errors
///
/// Returns an error if the file exists (without `--force`) or cannot be written.
#[instrument(skip_all)]
fn run_config_init(args: &ConfigInitArgs, dir: Option<&PathBuf>) -> Result<()> {
    let config_path = resolve_config_path(dir).context("failed to resolve config path")?;
    if config_path.exists() && !args.force {
        bail!(
            "config file already exists: {} (use --force to overwrite)",
            config_path.display()
        );
    }

    AppConfig::default()
        .save(&config_path)
        .context("failed to save config")?;
    tracing::info!("Config written to {}", config_path.display());
    Ok(())
}

/// Runs the `config show` subcommand.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or serialized.
#[instrument(skip_all)]
fn run_config_show(dir: Option<&PathBuf>) -> Result<()> {
    let config_path = resolve_config_path(dir).context("failed to resolve config path")?;
    let config = AppConfig::load(&config_path).context("failed to load config")?;

    tracing::info!("# {}", config_path.display());
    for line in config.to_toml()?.lines() {
        tracing::info!("{line}");
    }
    Ok(())
}

/// Writes shell completions to stdout.
fn run_completions(args: &CompletionsArgs) {
    let mut command = Cli::command();
    let name = command.get_name().to_owned();
    clap_complete::generate(args.shell, &mut command, name, &mut std::io::stdout());
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }

    #[cfg(feature = "otel")]
    let logger_provider = {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
        let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();

        let otel_layer = endpoint.as_ref().and_then(|_| {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .build()
                .ok()?;

            let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                .with_simple_exporter(exporter)
                .build();

            let tracer = opentelemetry::trace::TracerProvider::tracer(
                &tracer_provider,
                env!("CARGO_PKG_NAME"),
            );
            opentelemetry::global::set_tracer_provider(tracer_provider);

            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        });

        // Diagnostics are warn-level events, so they are exported as log records too.
        let logger_provider = endpoint.as_ref().and_then(|_| {
            let exporter = opentelemetry_otlp::LogExporter::builder()
                .with_http()
                .build()
                .ok()?;
            Some(
                opentelemetry_sdk::logs::SdkLoggerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build(),
            )
        });
        let log_layer = logger_provider
            .as_ref()
            .map(opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .with(log_layer)
            .init();

        logger_provider
    };

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Generate(args) => run_generate(&args, cli.dir.as_ref()).await,
        Commands::Channels(cmd) => match cmd.command {
            ChannelsSubcommands::List(args) => run_channels_list(&args, cli.dir.as_ref()),
        },
        Commands::Config(cmd) => match cmd.command {
            ConfigSubcommands::Init(args) => run_config_init(&args, cli.dir.as_ref()),
            ConfigSubcommands::Show => run_config_show(cli.dir.as_ref()),
        },
        Commands::Completions(args) => {
            run_completions(&args);
            Ok(())
        }
    };

    #[cfg(feature = "otel")]
    if let Some(provider) = logger_provider
        && let Err(e) = provider.shutdown()
    {
        tracing::debug!(error = %e, "Failed to flush OTLP logs");
    }

    result
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_overrides_config() {
        // Arrange
        let cli = Cli::parse_from([
            "epgmgr",
            "generate",
            "--channels",
            "my-channels.xml",
            "-o",
            "guide.xml",
            "--cutoff-hour",
            "6",
            "--days-before",
            "0",
            "--days-after",
            "3",
        ]);
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        let mut config = AppConfig::default();

        // Act
        args.apply(&mut config);

        // Assert
        assert_eq!(config.output.channels_file, PathBuf::from("my-channels.xml"));
        assert_eq!(config.output.path, PathBuf::from("guide.xml"));
        assert_eq!(config.schedule.cutoff_hour, 6);
        assert_eq!(config.schedule.date_window, [0, 3]);
    }

    #[test]
    fn test_generate_without_flags_keeps_config() {
        // Arrange
        let cli = Cli::parse_from(["epgmgr", "generate"]);
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        let mut config = AppConfig::default();

        // Act
        args.apply(&mut config);

        // Assert
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_generate_parses_date() {
        // Arrange & Act
        let cli = Cli::parse_from(["epgmgr", "generate", "--date", "2024-03-10"]);

        // Assert
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.date, NaiveDate::from_ymd_opt(2024, 3, 10));
    }

    #[test]
    fn test_build_client_rejects_bad_base_url() {
        // Arrange
        let mut config = AppConfig::default();
        config.source.base_url = Some(String::from("not a url"));

        // Act
        let result = build_mitv_client(&config);

        // Assert
        assert!(result.is_err());
    }
}
