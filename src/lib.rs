//! Review Assigner - reviewer assignment service for team pull requests.
//!
//! Assigns reviewers from the author's team when a pull request is opened,
//! keeps assignments consistent through reassignment and team deactivation,
//! and exposes the operations over a small JSON HTTP API.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::Config;
use crate::error::AppError;
use crate::services::{ReviewService, SqliteStore};

/// Install the global log subscriber. `log` records are bridged into it.
fn init_logging(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    // Ignore the error when a subscriber is already installed (tests).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}

/// Load configuration, open the database and serve until Ctrl-C.
pub async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;
    init_logging(&config.log_filter);

    log::info!("Opening database at {}", config.database_path.display());
    let pool = db::initialize_with(&config.database_path, config.database_max_connections).await?;

    let service = ReviewService::new(SqliteStore::new(pool), config.assignment.clone());
    let state = AppState::new(service);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to port {}: {}", config.port, e)))?;

    let cancel_token = CancellationToken::new();
    let shutdown = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Shutdown requested");
                shutdown.cancel();
            }
            Err(e) => log::error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    api::serve(listener, state, cancel_token).await
}
