use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use timetrack_core::TrackingEngine;
use timetrack_db::Database;
use timetrack_server::{AppState, Config, build_router};

/// Team time tracker API server.
#[derive(Debug, Parser)]
#[command(name = "timetracker-server", version, about, long_about = None)]
struct Args {
    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = Config::load_from(args.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    let db = Database::open(&config.database.path)
        .with_context(|| format!("failed to open {}", config.database.path.display()))?;
    let state = AppState::new(TrackingEngine::new(Arc::new(db)));

    let listener = TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    tracing::info!(addr = %listener.local_addr()?, "server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
    }
}
