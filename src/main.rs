//! Route Reload Dev Server
//!
//! Serves file-defined routes and rebuilds the route table whenever a route
//! source changes, without rebinding the listening socket.
//!
//! # Architecture Overview
//!
//! ```text
//!     routes/*.toml ──▶ build (discover, compile, watch)
//!                              │ change events
//!                              ▼
//!                       reload (debounce → generation → swap)
//!                              │
//!     Client Request           ▼
//!     ─────────▶ net listener ──▶ http dispatcher ──▶ routing table ──▶ handler
//!     ◀───────── response ◀──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use route_reload::build::HandlerRegistry;
use route_reload::config::validation::validate_config;
use route_reload::config::{load_config, ConfigError, DevServerConfig};
use route_reload::lifecycle::{wait_for_termination, DevServer};
use route_reload::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "route-reload")]
#[command(about = "Development HTTP server with live-reloaded routes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the routes directory and reload it on change
    Dev(DevArgs),
}

#[derive(Args)]
struct DevArgs {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing route manifests
    #[arg(long)]
    routes_dir: Option<PathBuf>,

    /// First port to try
    #[arg(short, long)]
    port: Option<u16>,

    /// Host or IP to bind
    #[arg(long)]
    host: Option<String>,
}

impl DevArgs {
    fn load(&self) -> Result<DevServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => DevServerConfig::default(),
        };

        if let Some(dir) = &self.routes_dir {
            config.routes.dir = dir.clone();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(host) = &self.host {
            config.listener.host = host.clone();
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let Commands::Dev(args) = cli.command;

    let config = args.load()?;
    logging::init(&config.observability);

    tracing::info!("route-reload v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        routes_dir = %config.routes.dir.display(),
        host = %config.listener.host,
        port = config.listener.port,
        debounce_ms = config.routes.debounce_ms,
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

    let server = DevServer::start(&config, HandlerRegistry::new()).await?;

    wait_for_termination().await;
    server.shutdown().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
