pub mod document;
pub mod document_store;
pub mod model;
pub mod query;
pub mod vector_repository;

pub use document::{EmbeddingRecord, JsonObject, SourceDocument};
pub use document_store::DocumentStore;
pub use model::{Embedder, LanguageModel};
pub use query::{QueryEngine, QueryResponse, SearchQuery, SearchResult};
pub use vector_repository::VectorRepository;
