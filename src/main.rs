//! Tube status gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http server ──▶ rate limiter ──▶ handler ──▶ TflClient ──▶ TfL API
//!                                                               │
//!                                          retry · circuit breaker · deadline
//!
//!     Cross-cutting: config · observability (tracing, Prometheus) · lifecycle
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use tube_status::config::load_config;
use tube_status::lifecycle::{spawn_signal_listener, Shutdown};
use tube_status::observability::{logging::init_logging, metrics::init_metrics};
use tube_status::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "tube-status", version, about = "Resilient TfL line status gateway")]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tube-status starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        upstream = %config.upstream.base_url,
        failure_threshold = config.circuit_breaker.failure_threshold,
        rate_limit_max = config.rate_limit.max_requests,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
