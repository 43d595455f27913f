use std::sync::Arc;

use mongo_rag::config;
use mongo_rag::initialization::initialize_query_engine;
use mongo_rag::server::{self, AppState};

use anyhow::Result;
use env_logger;
use log;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = config::load_config()?;
    log::debug!("Configuration loaded: {:?}", config.server);
    let config_arc = Arc::new(config);

    let state = AppState::default();
    let engine_state = state.engine.clone();

    // Requests get 503 until this finishes.
    let init_config = config_arc.clone();
    tokio::spawn(async move {
        log::info!("Background initialization task started.");
        match initialize_query_engine(init_config, engine_state).await {
            Ok(()) => log::info!("Background initialization completed successfully."),
            Err(e) => log::error!("Background initialization failed: {}", e),
        }
    });

    server::serve(&config_arc.server, state).await
}
