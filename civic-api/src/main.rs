//! civic-api - election-monitoring HTTP service
//!
//! Serves agent registration, Form34A submission, incident video records
//! and the reconciliation dashboard over one SQLite database.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use civic_common::config::{database_path, resolve_root_folder, CivicConfig, ROOT_FOLDER_ENV};
use civic_common::db::init_database;
use civic_common::db::sessions::purge_expired;
use civic_common::ReferenceData;
use civic_api::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for civic-api
#[derive(Parser, Debug)]
#[command(name = "civic-api")]
#[command(about = "Election monitoring API")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config)
    #[arg(short, long, env = "CIVIC_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(long, env = "CIVIC_HOST")]
    host: Option<String>,

    /// Root folder holding civic.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Config file (default: CIVIC_CONFIG, then platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "civic_api=info,civic_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting civic-api v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut config = CivicConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }
    config.validate().context("Invalid configuration")?;

    if !config.auth.enabled {
        warn!("Authentication disabled: X-User-Id header is trusted");
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let purged = purge_expired(&pool).await.context("Failed to purge sessions")?;
    if purged > 0 {
        info!("Removed {} expired sessions", purged);
    }

    let reference = ReferenceData::load_or_builtin(config.reference.path.as_deref())
        .context("Failed to load reference data")?;
    info!(
        counties = reference.counties().len(),
        polling_stations = reference.polling_stations().len(),
        "Reference data loaded"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid bind address")?;

    let state = AppState::new(pool, reference, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("civic-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
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
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
