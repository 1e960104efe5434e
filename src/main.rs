//! Beacon REST gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────┐
//!                         │                   GATEWAY                     │
//!     Client Request      │  ┌────────┐   ┌─────────┐   ┌─────────────┐   │
//!     ────────────────────┼─▶│  http  │──▶│ routing │──▶│  dispatch   │   │
//!                         │  │ server │   │templates│   │  pipeline   │   │
//!                         │  └────────┘   └─────────┘   └──────┬──────┘   │
//!                         │                                    │          │
//!                         │                     ┌──────────────┴───────┐  │
//!                         │                     │ payload: decode,     │  │
//!                         │                     │ field processing,    │  │
//!                         │                     │ ordered encode       │  │
//!                         │                     └──────────────┬───────┘  │
//!     Client Response     │  ┌────────┐                        │          │
//!     ◀───────────────────┼──│response│◀──── upstream call ────┴──────────┼──▶ gRPC-gateway
//!                         │  └────────┘                                   │    (/internal)
//!                         │                                               │
//!                         │   config · observability · lifecycle          │
//!                         └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use beacon_gateway::catalogue::beacon_factory;
use beacon_gateway::config::{load_config, GatewayConfig};
use beacon_gateway::lifecycle::{spawn_signal_listener, Shutdown};
use beacon_gateway::observability::{logging, metrics};
use beacon_gateway::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "beacon-gateway", version, about = "Beacon REST API gateway in front of a gRPC-gateway")]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("beacon-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        path_prefix = %config.upstream.path_prefix,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    spawn_signal_listener(&shutdown);

    let server = HttpServer::new(config, Arc::new(beacon_factory()))?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
