//! lbprobe echo replica binary

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lbprobe_echo::{serve, EchoService, ReplicaInfo};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(author, version, about = "Echo replica reporting its identity for lbprobe", long_about = None)]
struct Args {
    /// Port to listen on (all interfaces)
    #[arg(long, default_value_t = 9000)]
    port: u16,

    /// Artificial delay before each response (e.g. 250ms)
    #[arg(long, value_parser = humantime::parse_duration, default_value = "0s")]
    delay: Duration,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let replica = ReplicaInfo::from_env();
    info!("Starting echo server");
    info!("  Hostname: {}", replica.hostname);
    info!("  Name:     {}", replica.replica_name);
    info!("  Address:  {}", replica.replica_address);
    info!("  Port:     {}", args.port);
    if !args.delay.is_zero() {
        info!("  Delay:    {}", humantime::format_duration(args.delay));
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("listen on {addr}"))?;

    let service = EchoService::new(replica).with_delay(args.delay);
    serve(listener, service, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
    })
    .await
    .context("serve echo")?;

    Ok(())
}
