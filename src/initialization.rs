use crate::application::{IndexOptions, IndexService, QueryOptions, QueryService};
use crate::config::{AppConfig, EmbeddingProvider, VectorBackend};
use crate::domain::{DocumentStore, Embedder, LanguageModel, QueryEngine, VectorRepository};
use crate::infrastructure::embedding::resolve_fastembed_model;
use crate::infrastructure::{
    mongo, AtlasVectorStore, FastEmbedEmbedder, MongoDocumentStore, OpenAiChatModel, OpenAiEmbedder,
    QdrantVectorStore,
};
use crate::server::EngineSlot;

use anyhow::{anyhow, Result};
use log;
use mongodb::Database;
use std::sync::Arc;
use std::time::Duration;

fn openai_api_key(config: &AppConfig) -> Result<String> {
    config
        .openai
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| anyhow!("OPENAI_API_KEY is not set"))
}

/// Connects to MongoDB and verifies the deployment answers before returning the database.
pub async fn connect_database(config: &AppConfig) -> Result<Database> {
    let client = mongo::connect(&config.mongodb.uri).await?;
    mongo::ping(&client).await?;
    Ok(client.database(&config.mongodb.database))
}

pub fn document_store(config: &AppConfig, database: &Database) -> Result<Arc<dyn DocumentStore>> {
    Ok(Arc::new(MongoDocumentStore::new(database, &config.mongodb.collection)?))
}

pub async fn build_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>> {
    let timeout = Duration::from_secs(config.openai.timeout_secs);
    match config.embedding.provider {
        EmbeddingProvider::OpenAi => {
            log::info!(
                "Using OpenAI embeddings: model={}, dimensions={}",
                config.embedding.model,
                config.embedding.dimensions
            );
            let embedder = OpenAiEmbedder::new(
                config.openai.base_url.clone(),
                openai_api_key(config)?,
                config.embedding.model.clone(),
                config.embedding.dimensions,
                timeout,
            )?;
            Ok(Arc::new(embedder))
        }
        EmbeddingProvider::FastEmbed => {
            let (model, dimension) = resolve_fastembed_model(&config.embedding.model)?;
            if dimension != config.embedding.dimensions {
                log::warn!(
                    "Configured embedding.dimensions ({}) ignored, {:?} produces {} dimensions",
                    config.embedding.dimensions,
                    model,
                    dimension
                );
            }
            log::info!("Loading fastembed model {:?}...", model);
            let cache_dir = config.embedding.cache_dir.clone();
            let embedder =
                tokio::task::spawn_blocking(move || FastEmbedEmbedder::new(model, cache_dir)).await??;
            Ok(Arc::new(embedder))
        }
    }
}

/// Opens the configured vector store for vectors of `dimension` length.
pub async fn build_vector_repository(
    config: &AppConfig,
    database: &Database,
    dimension: usize,
) -> Result<Arc<dyn VectorRepository>> {
    match config.vector_store.backend {
        VectorBackend::Atlas => {
            let store = AtlasVectorStore::new(
                database,
                &config.mongodb.vectors,
                config.mongodb.vector_index.clone(),
            )?;
            log::info!(
                "Using Atlas vector search: collection='{}', index='{}'",
                store.collection_name(),
                store.index_name()
            );
            Ok(Arc::new(store))
        }
        VectorBackend::Qdrant => {
            let store = QdrantVectorStore::connect(
                &config.vector_store.qdrant_url,
                config.vector_store.qdrant_collection.clone(),
                dimension as u64,
            )?;
            store.initialize_collection().await?;
            Ok(Arc::new(store))
        }
    }
}

pub fn build_language_model(config: &AppConfig) -> Result<Arc<dyn LanguageModel>> {
    let model = OpenAiChatModel::new(
        config.openai.base_url.clone(),
        openai_api_key(config)?,
        config.openai.chat_model.clone(),
        config.openai.temperature,
        Duration::from_secs(config.openai.timeout_secs),
    )?;
    Ok(Arc::new(model))
}

pub async fn build_index_service(config: &AppConfig, options: IndexOptions) -> Result<IndexService> {
    let database = connect_database(config).await?;
    let documents = document_store(config, &database)?;
    let embedder = build_embedder(config).await?;
    let vectors = build_vector_repository(config, &database, embedder.dimension()).await?;
    Ok(IndexService::new(documents, embedder, vectors, options))
}

pub async fn build_query_service(config: &AppConfig) -> Result<QueryService> {
    let llm = build_language_model(config)?;
    let database = connect_database(config).await?;
    let embedder = build_embedder(config).await?;
    let vectors = build_vector_repository(config, &database, embedder.dimension()).await?;
    Ok(QueryService::new(embedder, vectors, llm, QueryOptions::from_config(config)))
}

/// Builds the query engine and publishes it into `engine_state` for the HTTP handlers.
pub async fn initialize_query_engine(config: Arc<AppConfig>, engine_state: EngineSlot) -> Result<()> {
    let service = build_query_service(&config).await.map_err(|e| {
        log::error!("Failed to build query engine: {:?}", e);
        e
    })?;
    let engine: Arc<dyn QueryEngine> = Arc::new(service);

    {
        let mut state = engine_state
            .lock()
            .map_err(|_| anyhow!("Query engine state lock poisoned"))?;
        *state = Some(engine);
    }
    log::info!("Query engine is now initialized and available.");
    Ok(())
}
