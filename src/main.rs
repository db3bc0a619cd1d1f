//! vitals service binary.
//!
//! Serves the liveness and readiness endpoints behind the standard
//! middleware stack (request timeout guard, panic recovery, request ID,
//! request tracing).
//!
//! ```text
//!     Client Request
//!     ──────────────▶ set request id → trace → recovery → timeout guard ──▶ /health/live
//!                                                                      └──▶ /health/ready
//!                                                                            └─ probes (one task each)
//! ```

use std::error::Error;
use std::path::PathBuf;

use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;

use vitals::config::{load_config, ServiceConfig};
use vitals::http::HttpServer;
use vitals::lifecycle::Shutdown;
use vitals::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "vitals")]
#[command(about = "Health endpoints with request deadline enforcement", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_ms = config.timeouts.request_ms,
        readiness_timeout_ms = config.readiness.overall_timeout_ms,
        probe_timeout_ms = config.readiness.per_probe_timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config, Router::new(), Vec::new());
    let server_task = tokio::spawn(server.run(listener, server_shutdown));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    shutdown.trigger();

    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
