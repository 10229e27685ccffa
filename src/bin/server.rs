//! abkrdb server daemon
//!
//! # Usage
//!
//! ```bash
//! # Keep the store in memory only
//! abkrdb-server --memory
//!
//! # Persist the store to a snapshot file
//! abkrdb-server --data-dir /var/lib/abkrdb --store /var/lib/abkrdb/store.json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use abkrdb::server::{Server, ServerConfig, DEFAULT_PORT};

/// abkrdb server daemon
#[derive(Parser, Debug)]
#[command(name = "abkrdb-server", version, about = "abkrdb database server")]
struct Args {
    /// Host address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "ABKR_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT, env = "ABKR_PORT")]
    port: u16,

    /// Directory holding catalog files
    #[arg(short = 'd', long, value_name = "DIR", default_value = "data", env = "ABKR_DATA_DIR")]
    data_dir: PathBuf,

    /// Snapshot file of the document store
    #[arg(short = 's', long, value_name = "FILE", env = "ABKR_STORE")]
    store: Option<PathBuf>,

    /// Keep the document store in memory only
    #[arg(long)]
    memory: bool,

    /// Seconds to wait for a client to finish its request
    #[arg(long, default_value_t = 30)]
    request_timeout: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "ABKR_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut config = ServerConfig::new()
        .host(args.host)
        .port(args.port)
        .data_dir(args.data_dir)
        .memory(args.memory)
        .request_timeout(std::time::Duration::from_secs(args.request_timeout));
    if let Some(store) = args.store {
        config = config.store_path(store);
    }

    let server = match Server::open(config) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };
    info!("Catalog directory: {}", server.config().data_dir.display());

    let listener = server.bind().await.context("Failed to bind listener")?;
    server
        .run_until(listener, shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("abkrdb={level},abkrdb_server={level}")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
