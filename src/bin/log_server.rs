//! Log Dashboard Server
//!
//! Serves the log RPC API over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Start server with defaults (port 2022)
//! cargo run --bin log-server
//!
//! # Custom port, throwaway in-memory store
//! cargo run --bin log-server -- --port 8080 --memory
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log_dashboard::config::{default_config_path, DashboardConfig};
use log_dashboard::server::start_server;
use log_dashboard::LogService;

#[derive(Parser)]
#[command(name = "log-server")]
#[command(author = "e421")]
#[command(version)]
#[command(about = "Log Dashboard Server - log store and stream control over RPC")]
struct Args {
    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file
    #[arg(long, conflicts_with = "memory")]
    db: Option<PathBuf>,

    /// Keep logs in memory only
    #[arg(long)]
    memory: bool,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,

    /// Config file (default: ~/.config/log-dashboard/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(default_config_path);
    let mut config = DashboardConfig::load_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?
        .with_env()
        .server;

    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(db) = args.db {
        config.database_path = Some(db);
    }
    if args.memory {
        config.database_path = None;
    }
    if args.no_cors {
        config.enable_cors = false;
    }

    let service = match &config.database_path {
        Some(path) => LogService::open(path)
            .with_context(|| format!("opening database {}", path.display()))?,
        None => LogService::in_memory()?,
    };

    start_server(&config, service).await
}
