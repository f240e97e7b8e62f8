//! HTTP server lifecycle.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::services::{ReviewService, SqliteStore};

/// Shared state for the axum routes.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReviewService<SqliteStore>>,
}

impl AppState {
    pub fn new(service: ReviewService<SqliteStore>) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Serve the API on `listener` until `cancel_token` fires.
///
/// In-flight requests are allowed to finish before this returns.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel_token: CancellationToken,
) -> Result<(), AppError> {
    let addr = listener
        .local_addr()
        .map_err(|e| AppError::internal(format!("Failed to read listener address: {}", e)))?;
    log::info!("[server] Listening on http://{}", addr);

    axum::serve(listener, super::router(state))
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    log::info!("[server] Stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssignmentSettings;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_serve_stops_on_cancel() {
        let dir = tempdir().unwrap();
        let pool = crate::db::initialize(&dir.path().join("test.db")).await.unwrap();
        let state = AppState::new(ReviewService::new(
            SqliteStore::new(pool),
            AssignmentSettings::default(),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let cancel_token = CancellationToken::new();
        let server = tokio::spawn(serve(listener, state, cancel_token.clone()));

        cancel_token.cancel();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
