pub mod error;
pub mod form;
pub mod middleware;
pub mod routes;

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};

use crate::config::ServerConfig;
use crate::domain::QueryEngine;

pub use error::ApiError;
pub use form::QueryForm;
pub use routes::create_router;

/// Filled by the background initialization task once the engine is ready.
pub type EngineSlot = Arc<Mutex<Option<Arc<dyn QueryEngine>>>>;

#[derive(Clone, Default)]
pub struct AppState {
    pub engine: EngineSlot,
}

impl AppState {
    pub fn new(engine: EngineSlot) -> Self {
        Self { engine }
    }

    /// State whose engine is available immediately.
    pub fn ready(engine: Arc<dyn QueryEngine>) -> Self {
        Self { engine: Arc::new(Mutex::new(Some(engine))) }
    }

    pub fn engine(&self) -> Result<Arc<dyn QueryEngine>, ApiError> {
        let guard = self
            .engine
            .lock()
            .map_err(|_| ApiError::Internal("query engine state lock poisoned".to_string()))?;
        guard.clone().ok_or(ApiError::NotReady)
    }
}

/// Binds the listener and serves until Ctrl+C.
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    log::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Received Ctrl+C, shutting down..."),
        Err(e) => log::error!("Failed to listen for Ctrl+C: {}", e),
    }
}
