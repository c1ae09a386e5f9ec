//! Command-line interface for otelgen.
//!
//! `otelgen traces|metrics|logs --otlp-endpoint <url>` generates one signal
//! for a fixed duration and prints the number of items generated.

use crate::core::{GenerationConfig, GenerationConfigBuilder, Headers, OtelgenError, Result};
use crate::endpoint::PortConvention;
use crate::generator::{self, Signal};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Synthetic OpenTelemetry traffic generator
#[derive(Parser, Debug)]
#[command(name = "otelgen")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Signal to generate
    #[command(subcommand)]
    pub command: Command,
}

/// One subcommand per signal.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate traces: a parent span with 1-3 children per tick
    Traces(CommonArgs),
    /// Generate metrics: counter, histogram and gauge updates
    Metrics(CommonArgs),
    /// Generate structured JSON log records
    Logs(LogsArgs),
}

/// Flags shared by every signal.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// OTLP endpoint, e.g. grpc://localhost:4317 or https://ingest.example.com
    #[arg(long, env = "OTELGEN_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Service name reported in the resource (default: otelgen)
    #[arg(long, env = "OTELGEN_SERVICE")]
    pub service: Option<String>,

    /// Items generated per second (default: 1)
    #[arg(long)]
    pub rate: Option<u32>,

    /// How long to generate for, e.g. 30s or 5m (default: 10s)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Pad each record to about this size, e.g. 500b or 1kb
    #[arg(long)]
    pub payload_size: Option<String>,

    /// Extra headers as key=value, comma separated or repeated
    #[arg(long, value_delimiter = ',', value_parser = Headers::parse_pair)]
    pub headers: Vec<(String, String)>,

    /// Print configuration and connectivity diagnostics
    #[arg(short, long)]
    pub verbose: bool,

    /// Accept any TLS certificate from the endpoint
    #[arg(long)]
    pub insecure_skip_verify: bool,

    /// Default ports when the endpoint has none (default: managed)
    #[arg(long, value_enum)]
    pub port_convention: Option<PortConvention>,

    /// YAML configuration file; command-line flags take precedence
    #[arg(short, long, env = "OTELGEN_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Flags for the `logs` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct LogsArgs {
    /// Flags shared with `traces` and `metrics`
    #[command(flatten)]
    pub common: CommonArgs,

    /// Maximum log records per export batch (default: 512)
    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

impl Command {
    /// Signal selected by the subcommand
    pub fn signal(&self) -> Signal {
        match self {
            Command::Traces(_) => Signal::Traces,
            Command::Metrics(_) => Signal::Metrics,
            Command::Logs(_) => Signal::Logs,
        }
    }

    /// Flags shared by every subcommand
    pub fn common(&self) -> &CommonArgs {
        match self {
            Command::Traces(args) | Command::Metrics(args) => args,
            Command::Logs(args) => &args.common,
        }
    }

    fn batch_size(&self) -> Option<usize> {
        match self {
            Command::Logs(args) => args.batch_size,
            _ => None,
        }
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments and environment variables (highest priority)
    /// 2. Config file
    /// 3. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<GenerationConfig> {
        let args = self.common();
        let mut builder = GenerationConfigBuilder::new();

        if let Some(path) = &args.config {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                OtelgenError::config(format!("Failed to read config file {:?}: {}", path, e))
            })?;
            builder = builder.from_yaml(&content)?;
        }

        if let Some(endpoint) = &args.otlp_endpoint {
            builder = builder.endpoint(endpoint.as_str());
        }
        if let Some(service) = &args.service {
            builder = builder.service_name(service.as_str());
        }
        if let Some(rate) = args.rate {
            builder = builder.rate(rate);
        }
        if let Some(duration) = args.duration {
            builder = builder.duration(duration);
        }
        if let Some(size) = &args.payload_size {
            builder = builder.payload_size(size.as_str());
        }
        if let Some(batch_size) = self.batch_size() {
            builder = builder.batch_size(batch_size);
        }
        if let Some(convention) = args.port_convention {
            builder = builder.port_convention(convention);
        }
        // Flags can only switch these on
        if args.verbose {
            builder = builder.verbose(true);
        }
        if args.insecure_skip_verify {
            builder = builder.skip_tls_verify(true);
        }

        builder
            .headers(args.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .build()
    }
}

/// Initialize logging.
///
/// `RUST_LOG` wins, then `OTELGEN_LOG_LEVEL`, then `info`; `verbose` forces
/// debug output for otelgen itself.
pub fn init_logging(verbose: bool) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_log_level = std::env::var("OTELGEN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let filter = if verbose {
        EnvFilter::new("info,otelgen=debug,otelgen_lib=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_log_level))
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| OtelgenError::config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// Banner printed before generation starts.
pub fn banner(signal: Signal, config: &GenerationConfig) -> String {
    format!(
        "Generating {} to {} for service {} at {}/s for {}",
        signal,
        config.endpoint,
        config.service_name,
        config.rate,
        humantime::format_duration(config.duration)
    )
}

fn print_config(signal: Signal, config: &GenerationConfig) {
    let endpoint = &config.endpoint;
    println!("Configuration:");
    println!("  Protocol: {}", endpoint.protocol);
    println!("  Address: {}", endpoint.address());
    println!("  TLS: {}", endpoint.secure);
    if endpoint.secure {
        println!("  Verify certificates: {}", !config.skip_tls_verify);
    }
    if config.headers.is_empty() {
        println!("  Headers: none");
    } else {
        println!("  Headers: {}", config.headers);
    }
    if config.payload_size > 0 {
        println!("  Payload size: {} bytes", config.payload_size);
    }
    if signal == Signal::Logs {
        println!("  Batch size: {}", config.batch_size);
    }

    if endpoint.default_port {
        tracing::warn!(
            "No port in endpoint, using default port {} for {}",
            endpoint.port,
            endpoint.protocol
        );
    }
}

/// Execute one otelgen invocation.
pub async fn execute(cli: Cli) -> Result<()> {
    let signal = cli.command.signal();
    let config = cli.command.load_config().await?;

    init_logging(config.verbose)?;
    if let Some(path) = &cli.command.common().config {
        tracing::debug!("Loaded configuration from {:?}", path);
    }

    println!("{}", banner(signal, &config));
    if config.verbose {
        print_config(signal, &config);
    }

    let report = match signal {
        Signal::Traces => generator::traces::run(&config).await?,
        Signal::Metrics => generator::metrics::run(&config).await?,
        Signal::Logs => generator::logs::run(&config).await?,
    };

    tracing::debug!(
        "Run finished after {:?} ({} {})",
        report.elapsed,
        report.emitted,
        report.signal.noun()
    );
    Ok(())
}
