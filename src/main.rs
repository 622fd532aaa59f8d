//! Failover reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                   FAILOVER PROXY                      │
//!   Client Request   │  ┌─────────┐   ┌──────────────┐   ┌───────────────┐  │
//!   ─────────────────┼─▶│  http   │──▶│  resilience  │──▶│   forwarder   │──┼──▶ Target
//!                    │  │ server  │   │   failover   │   │ (hyper client)│  │
//!                    │  └─────────┘   └──────┬───────┘   └───────────────┘  │
//!                    │                       │ select / exclude             │
//!                    │                       ▼                              │
//!                    │                ┌──────────────┐   ┌───────────────┐  │
//!                    │                │    health    │◀──│ scheduler tick│──┼──▶ Probe
//!                    │                │   manager    │   │  (background) │  │
//!                    │                └──────────────┘   └───────────────┘  │
//!                    │                                                      │
//!                    │  config · observability · admin · lifecycle          │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use failover_proxy::config::load_config;
use failover_proxy::lifecycle::{wait_for_shutdown_signal, Shutdown};
use failover_proxy::observability::{logging, metrics};
use failover_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "failover-proxy", version, about = "Failover reverse proxy for redundant upstreams")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "failover-proxy starting");

    tracing::info!(
        config = %args.config.display(),
        bind_address = %config.listener.bind_address,
        targets = config.targets.len(),
        rolling_window = config.health_check.rolling_window_taint_enabled,
        max_retries = config.failover.max_retries,
        max_reroutes = config.failover.max_reroutes,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal.trigger();
    });

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
