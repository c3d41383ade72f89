use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use config::{Config, Environment, File as ConfigFile};
use lbprobe_loadtest::{
    ConnectionPool, GrpcConnector, LoadTestConfig, LoopConfig, RunOrchestrator, RunReport,
};
use serde::Deserialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Parser, Clone)]
#[command(author, version, about = "gRPC load-balancer fairness load generator", long_about = None)]
struct Args {
    /// gRPC target host:port [default: grpc-server.test.svc.cluster.local:9000]
    #[arg(long)]
    target: Option<String>,

    /// Total number of requests per run [default: 1000]
    #[arg(long)]
    total: Option<u64>,

    /// Number of concurrent workers [default: 50]
    #[arg(long)]
    concurrency: Option<usize>,

    /// Number of gRPC connections shared round-robin by workers [default: 3]
    #[arg(long)]
    conns: Option<usize>,

    /// Per-request timeout, e.g. 10s or 500ms [default: 10s]
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Timeout for establishing each connection [default: 10s]
    #[arg(long, value_parser = humantime::parse_duration)]
    dial_timeout: Option<Duration>,

    /// Repeat the test until interrupted
    #[arg(long = "loop")]
    repeat: bool,

    /// Pause between runs in loop mode [default: 10s]
    #[arg(long, value_parser = humantime::parse_duration)]
    interval: Option<Duration>,

    /// Stop loop mode after this many runs
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Log every response and every failed request
    #[arg(long)]
    verbose: bool,

    /// Optional settings file (TOML, YAML or JSON); LBPROBE_* env vars override it
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the last run's report as JSON to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

/// Values read from the settings file and `LBPROBE_*` environment variables.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    target: Option<String>,
    total: Option<u64>,
    concurrency: Option<usize>,
    conns: Option<usize>,
    timeout: Option<String>,
    dial_timeout: Option<String>,
    #[serde(rename = "loop")]
    repeat: Option<bool>,
    interval: Option<String>,
    max_cycles: Option<u64>,
    verbose: Option<bool>,
}

fn load_settings(path: Option<&Path>) -> Result<FileSettings> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file {} not found (specified via --config)",
                path.display()
            );
        }
        builder = builder.add_source(ConfigFile::from(path));
    }

    builder = builder.add_source(Environment::with_prefix("LBPROBE").try_parsing(true));

    builder
        .build()
        .context("load settings")?
        .try_deserialize()
        .context("parse settings")
}

fn parse_duration(field: &str, raw: Option<&str>) -> Result<Option<Duration>> {
    raw.map(|value| {
        humantime::parse_duration(value.trim())
            .map_err(|err| anyhow!("invalid {field} duration {value:?}: {err}"))
    })
    .transpose()
}

/// Merge defaults, settings and flags; flags win.
fn resolve_config(args: &Args, settings: FileSettings) -> Result<LoadTestConfig> {
    let defaults = LoadTestConfig::default();
    let loop_defaults = LoopConfig::default();

    let timeout = parse_duration("timeout", settings.timeout.as_deref())?;
    let dial_timeout = parse_duration("dial_timeout", settings.dial_timeout.as_deref())?;
    let interval = parse_duration("interval", settings.interval.as_deref())?;

    let repeat = args.repeat || settings.repeat.unwrap_or(false);
    let repeat = repeat.then(|| LoopConfig {
        interval: args.interval.or(interval).unwrap_or(loop_defaults.interval),
        max_cycles: args.max_cycles.or(settings.max_cycles),
    });

    Ok(LoadTestConfig {
        target: args
            .target
            .clone()
            .or(settings.target)
            .unwrap_or(defaults.target),
        total: args.total.or(settings.total).unwrap_or(defaults.total),
        concurrency: args
            .concurrency
            .or(settings.concurrency)
            .unwrap_or(defaults.concurrency),
        connections: args
            .conns
            .or(settings.conns)
            .unwrap_or(defaults.connections),
        request_timeout: args.timeout.or(timeout).unwrap_or(defaults.request_timeout),
        dial_timeout: args
            .dial_timeout
            .or(dial_timeout)
            .unwrap_or(defaults.dial_timeout),
        repeat,
        verbose: args.verbose || settings.verbose.unwrap_or(false),
    })
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

fn log_banner(config: &LoadTestConfig) {
    info!("gRPC Load Test Client");
    info!("  Target:       {}", config.target);
    info!("  Total:        {}", config.total);
    info!("  Concurrency:  {}", config.concurrency);
    info!("  Connections:  {}", config.connections);
    info!("  Workers/conn: {}", config.workers_per_connection());
    info!("  Timeout:      {}", humantime::format_duration(config.request_timeout));
    info!("  Loop:         {}", config.repeat.is_some());
    if let Some(repeat) = &config.repeat {
        info!("  Interval:     {}", humantime::format_duration(repeat.interval));
        if let Some(max) = repeat.max_cycles {
            info!("  Max cycles:   {}", max);
        }
    }
    info!("  Verbose:      {}", config.verbose);
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
    }
    fs::write(path, serde_json::to_vec_pretty(report)?)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Interrupt received, stopping after the current run");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_format);

    let settings = load_settings(args.config.as_deref())?;
    let config = resolve_config(&args, settings)?;
    config.validate()?;
    log_banner(&config);

    let pool = match ConnectionPool::connect(
        &GrpcConnector,
        &config.target,
        config.connections,
        config.dial_timeout,
    )
    .await
    {
        Ok(pool) => pool,
        Err(err) => {
            error!("Failed to connect: {}", err);
            return Err(err.into());
        }
    };

    let runner = RunOrchestrator::new(pool, config);

    match runner.config().repeat.clone() {
        Some(repeat) => {
            info!("Running in loop mode (Ctrl+C to stop)...");
            let report_path = args.report.as_deref();
            runner
                .run_loop(repeat.interval, repeat.max_cycles, shutdown_signal(), |report| {
                    print!("{report}");
                    if let Some(path) = report_path {
                        if let Err(err) = write_report(path, report) {
                            warn!("Failed to write report: {:#}", err);
                        }
                    }
                })
                .await;
        }
        None => {
            info!("Starting test...");
            let report = runner.execute_once().await;
            print!("{report}");
            if let Some(path) = &args.report {
                write_report(path, &report)?;
            }
        }
    }

    Ok(())
}
