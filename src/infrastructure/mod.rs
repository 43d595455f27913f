pub mod atlas_vector_store;
pub mod embedding;
pub mod file_system;
pub mod llm;
pub mod mongo;
pub mod vector_db;

// Re-export key types for easier access from application layer
pub use atlas_vector_store::AtlasVectorStore;
pub use embedding::{FastEmbedEmbedder, OpenAiEmbedder};
pub use llm::OpenAiChatModel;
pub use mongo::MongoDocumentStore;
pub use vector_db::QdrantVectorStore;

// Re-export EmbeddingModel directly from the dependency
pub use fastembed::EmbeddingModel;
