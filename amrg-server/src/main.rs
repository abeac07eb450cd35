//! amrg-server - Audio Merger web service
//!
//! Serves a browser form that uploads audio files, merges them in order into
//! one 192 kbps MP3 with optional ID3 metadata, and returns it for download.

use std::path::PathBuf;

use amrg_server::config::{CliOverrides, ServerConfig};
use amrg_server::{build_router, AppState};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for amrg-server
#[derive(Parser, Debug)]
#[command(name = "amrg-server")]
#[command(about = "Merge audio files into a single tagged MP3")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "AMRG_PORT")]
    port: Option<u16>,

    /// Interface address to bind
    #[arg(short, long, env = "AMRG_BIND_ADDRESS")]
    bind: Option<String>,

    /// Explicit TOML config file
    #[arg(short, long, env = "AMRG_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum merge request size in MiB
    #[arg(long, env = "AMRG_MAX_UPLOAD_MB")]
    max_upload_mb: Option<u64>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "AMRG_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is loaded before tracing so the configured level can apply;
    // a missing file is only reported once logging is up.
    let toml_config = amrg_common::config::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    let overrides = CliOverrides {
        bind_address: args.bind,
        port: args.port,
        max_upload_mb: args.max_upload_mb,
        log_level: args.log_level,
    };

    let level = overrides
        .log_level
        .clone()
        .unwrap_or_else(|| toml_config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("amrg_server={level},amrg_common={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Audio Merger (amrg-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if args.config.is_none() && amrg_common::config::find_config_file().is_none() {
        info!("No config file found, using compiled defaults");
    }

    let config = ServerConfig::resolve(&overrides, &toml_config)
        .context("Invalid configuration")?;
    let bind_addr = config.bind_addr;

    if config.max_upload_bytes.is_none() {
        warn!("No upload limit configured; request bodies are unbounded");
    }

    let state = AppState::new(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
