//! Sitesmith Key-Value Server Binary
//!
//! Serves the embedded engine over TCP so several `sitesmith` processes can
//! share one project store.

use std::sync::Arc;

use clap::Parser;
use sitesmith::config::WalSyncStrategy;
use sitesmith::network::Server;
use sitesmith::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// Sitesmith key-value server
#[derive(Parser, Debug)]
#[command(name = "sitesmith-kv")]
#[command(about = "Durable key-value server backing Sitesmith project storage")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, env = "SITESMITH_DATA_DIR", default_value = "./sitesmith_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6380")]
    listen: String,

    /// Worker threads (concurrent connections)
    #[arg(short, long, default_value = "64")]
    max_connections: usize,

    /// WAL size in MB that triggers a checkpoint
    #[arg(short = 'c', long, default_value = "4")]
    checkpoint_mb: usize,

    /// fsync every WAL entry instead of every 100
    #[arg(long)]
    sync_every_write: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sitesmith=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("Sitesmith KV Server v{}", sitesmith::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);

    let sync = if args.sync_every_write {
        WalSyncStrategy::EveryWrite
    } else {
        WalSyncStrategy::EveryNEntries { count: 100 }
    };

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .checkpoint_threshold(args.checkpoint_mb * 1024 * 1024)
        .wal_sync_strategy(sync)
        .build();

    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        std::process::exit(2);
    }

    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(keys = engine.entry_count(), "Engine initialized");

    let server = match Server::bind(config, engine) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", args.listen, e);
            std::process::exit(1);
        }
    };

    // Unflushed WAL entries are replayed on the next start
    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
