use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_CONFIG_FILENAME: &str = "mongo_rag.toml";
const CONFIG_PATH_ENV: &str = "MONGO_RAG_CONFIG_PATH";

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    /// Collection the imported records are written to.
    pub collection: String,
    /// Collection holding the embedding records.
    pub vectors: String,
    /// Name of the Atlas vector search index on `vectors`.
    pub vector_index: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "tiny_tweets_db".to_string(),
            collection: "tiny_tweets_collection".to_string(),
            vectors: "tweet_embeddings".to_string(),
            vector_index: "vector_index".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum EmbeddingProvider {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "fastembed")]
    FastEmbed,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimensions: usize,
    /// Number of texts sent per embedding request.
    pub batch_size: usize,
    /// Where fastembed keeps downloaded model files.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let default_cache_dir = ProjectDirs::from("dev", "mongo-rag", "mongo-rag")
            .map(|dirs| dirs.cache_dir().join("models"));
        Self {
            provider: EmbeddingProvider::OpenAi,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            batch_size: 10,
            cache_dir: default_cache_dir,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: OPENAI_BASE_URL.to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            temperature: 0.1,
            timeout_secs: 60,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum VectorBackend {
    #[serde(rename = "atlas")]
    Atlas,
    #[serde(rename = "qdrant")]
    Qdrant,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    pub qdrant_url: String,
    pub qdrant_collection: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Atlas,
            qdrant_url: "http://localhost:6334".to_string(),
            qdrant_collection: "tweet_embeddings".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// Top-level fields whose values are embedded. Every indexed document must have them.
    pub field_names: Vec<String>,
    pub field_separator: String,
    /// Mongo filter selecting which documents to index.
    #[serde(default)]
    pub query_filter: Option<serde_json::Value>,
    /// Upper bound on chunk length, in characters.
    pub chunk_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            field_names: vec!["full_text".to_string()],
            field_separator: String::new(),
            query_filter: None,
            chunk_size: 4000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QueryConfig {
    /// Tweets are short, so more of them are pulled into each answer than usual.
    pub similarity_top_k: usize,
    #[serde(default)]
    pub score_threshold: Option<f32>,
    /// Character budget for the retrieved context of one prompt.
    pub context_window: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            similarity_top_k: 20,
            score_threshold: None,
            context_window: 12_000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub mongodb: MongoConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Loads configuration from defaults, the TOML file, `.env` and the process environment.
pub fn load_config() -> Result<AppConfig> {
    // A missing .env is normal outside development.
    dotenv::dotenv().ok();

    let config_path_env = std::env::var(CONFIG_PATH_ENV).ok();
    let config_path = config_path_env
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_FILENAME.to_string());

    if let Some(ref env_path) = config_path_env {
        if !std::path::Path::new(env_path).exists() {
            return Err(anyhow!("Config file not found at {}: {}", CONFIG_PATH_ENV, env_path));
        }
        log::info!("{} is set: {}", CONFIG_PATH_ENV, env_path);
    } else {
        log::debug!("{} not set, falling back to default: {}", CONFIG_PATH_ENV, config_path);
    }

    let figment = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&config_path))
        // MONGODB_URI, MONGODB_DATABASE, ... as the tutorial's .env has them
        .merge(Env::prefixed("MONGODB_").map(|key| format!("mongodb.{}", key).into()))
        .merge(
            Env::raw()
                .only(&["OPENAI_API_KEY"])
                .map(|_| "openai.api_key".into()),
        )
        .merge(Env::prefixed("MONGO_RAG_").ignore(&["CONFIG_PATH"]).split("__"));

    let config: AppConfig = figment.extract().context("Failed to extract AppConfig")?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<()> {
    let mongo = &config.mongodb;
    for (name, value) in [
        ("mongodb.uri", &mongo.uri),
        ("mongodb.database", &mongo.database),
        ("mongodb.collection", &mongo.collection),
        ("mongodb.vectors", &mongo.vectors),
        ("mongodb.vector_index", &mongo.vector_index),
    ] {
        if value.trim().is_empty() {
            return Err(anyhow!("Configured {} cannot be empty", name));
        }
    }
    if config.embedding.batch_size == 0 {
        return Err(anyhow!("embedding.batch_size must be greater than zero"));
    }
    if config.embedding.dimensions == 0 {
        return Err(anyhow!("embedding.dimensions must be greater than zero"));
    }
    if config.index.field_names.is_empty() {
        return Err(anyhow!("index.field_names must name at least one field"));
    }
    if config.index.chunk_size == 0 {
        return Err(anyhow!("index.chunk_size must be greater than zero"));
    }
    if let Some(filter) = &config.index.query_filter {
        if !filter.is_object() {
            return Err(anyhow!("index.query_filter must be a JSON object"));
        }
    }
    if config.query.similarity_top_k == 0 {
        return Err(anyhow!("query.similarity_top_k must be greater than zero"));
    }
    if config.query.context_window == 0 {
        return Err(anyhow!("query.context_window must be greater than zero"));
    }
    Ok(())
}
