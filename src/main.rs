//! Catalog evaluation gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ admission guard ──────────▶ handler ──▶ model runner
//!                                      │ rate limiter  (429)        │
//!                                      │ security      (403 / 503)  │
//!                                      │   └──▶ policy service      │
//!                                      └──────── audit ◀────────────┘
//!                                                  └──▶ audit sink (detached)
//!
//!     Cross-cutting: config (TOML + env, hot reload), logging, metrics, lifecycle
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use catalog_gateway::config::{load_with_env, watcher::ConfigWatcher};
use catalog_gateway::http::HttpServer;
use catalog_gateway::lifecycle::{wait_for_signal, Shutdown};
use catalog_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "catalog-gateway")]
#[command(about = "Product evaluation service with an admission guard", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults plus environment overrides when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_with_env(args.config.as_deref())?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "catalog-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit = config.rate_limit.max_requests,
        window_ms = config.rate_limit.window_ms,
        security_enabled = config.security.enabled,
        security_mode = %config.security.mode,
        audit_enabled = config.audit.enabled,
        model = %config.model.model,
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
    let server_shutdown = shutdown.subscribe();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    // The watcher must outlive the server for updates to keep flowing.
    let (_watcher, config_updates) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        (None, true) => {
            tracing::warn!("--watch ignored without --config");
            (None, mpsc::unbounded_channel().1)
        }
        _ => (None, mpsc::unbounded_channel().1),
    };

    let server = HttpServer::new(config);
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
