//! Perimeter transform gateway.
//!
//! Receives HTTP POSTs already routed here by an external gateway layer,
//! swaps the bearer credential for an identity header, reverses the body,
//! and forwards the result to one configured origin.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use perimeter_gateway::config::loader::load_config;
use perimeter_gateway::config::watcher::ConfigWatcher;
use perimeter_gateway::config::GatewayConfig;
use perimeter_gateway::http::HttpServer;
use perimeter_gateway::lifecycle::{signals, Shutdown};
use perimeter_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "perimeter-gateway")]
#[command(about = "Bearer-to-identity transform gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        origin = %config.origin.url,
        identity_claim = %config.identity.claim,
        identity_header = %config.identity.header,
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

    // Watch the config file for hot reload; without a file there is nothing
    // to watch and the channel stays silent.
    let (config_updates, _watcher_guard) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let guard = watcher.run()?;
            (updates, Some(guard))
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        tracing::info!("Signal received, shutting down");
        shutdown.trigger();
    });

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
