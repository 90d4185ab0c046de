//! concordia-ws - JSON web services for the Concordia transcription ledger
//!
//! Startup order: parse arguments, load `concordia-ws.toml`, initialize
//! tracing, log build identification, resolve the root folder, open
//! `concordia.db`, then serve until Ctrl+C or SIGTERM.

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use concordia_common::config::{load_module_config, RootFolderInitializer, RootFolderResolver, TomlConfig};
use concordia_common::db::init::init_database_with;
use concordia_common::Ledger;
use concordia_ws::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const MODULE_NAME: &str = "concordia-ws";

/// Command-line arguments for concordia-ws
#[derive(Parser, Debug)]
#[command(name = "concordia-ws")]
#[command(about = "Transcription ledger web services for Concordia")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "CONCORDIA_WS_PORT")]
    port: Option<u16>,

    /// Root folder holding concordia.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Explicit config file instead of the per-user/system lookup
    #[arg(short, long, env = "CONCORDIA_WS_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Recompute every asset's cached transcription status before serving
    #[arg(long)]
    rebuild_status_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_module_config(MODULE_NAME, args.config.as_deref());

    init_tracing(&config)?;

    // Build identification first, before any database delay
    info!(
        "Starting Concordia web services (concordia-ws) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_override(args.root_folder.clone())
        .with_toml_config(&config)
        .resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let pool = init_database_with(&db_path, &config.database)
        .await
        .context("Failed to initialize database")?;

    let ledger = Ledger::new(pool, &config.database, &config.listing);

    if args.rebuild_status_cache {
        let changed = ledger
            .rebuild_status_cache()
            .await
            .context("Failed to rebuild transcription status cache")?;
        info!(changed, "Transcription status cache rebuilt");
    }

    let state = AppState::new(ledger.clone(), config.listing);
    let app = build_router(state);

    let port = args.port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", args.bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", args.bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("concordia-ws listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    ledger.pool().close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// RUST_LOG wins over the configured level; logs go to the configured file
/// or stderr
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
