//! PathKV Server Binary
//!
//! Serves the PathKV protocol over TCP, backed by the in-memory engine.

use std::sync::Arc;

use clap::Parser;
use pathkv::network::Server;
use pathkv::{Config, MemoryEngine, Service};
use tracing_subscriber::{fmt, EnvFilter};

/// PathKV Server
#[derive(Parser, Debug)]
#[command(name = "pathkv-server")]
#[command(about = "Hierarchical, workspace-isolated key-value data layer")]
#[command(version)]
struct Args {
    /// Listen address (host:port); overrides PATHKV_LISTEN_ADDR
    #[arg(short, long)]
    listen: Option<String>,

    /// Backing table name; overrides PATHKV_TABLE_NAME
    #[arg(short, long)]
    table: Option<String>,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Allow shared prefixes (e.g. /global/) next to workspace roots
    #[arg(long)]
    shared_prefixes: bool,

    /// Log every request at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(table) = args.table {
        config.table_name = table;
    }
    config.max_connections = args.max_connections;
    config.verbose_logging |= args.verbose;
    if args.shared_prefixes {
        config.strict_workspaces = false;
    }

    // Initialize tracing/logging
    let default_filter = if config.verbose_logging {
        "info,pathkv=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    tracing::info!("PathKV Server v{}", pathkv::VERSION);
    tracing::info!("Table: {}", config.table_name);
    tracing::info!("Strict workspaces: {}", config.strict_workspaces);

    let engine = Arc::new(MemoryEngine::new(config.table_name.clone()));
    let service = Arc::new(Service::new(config, engine));

    let server = match Server::bind(Arc::clone(&service)) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    service.close();
    tracing::info!("Server stopped");
}
