use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// Represents a question asked against the vector collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), limit: None }
    }
}

// A retrieved chunk, linking back to the source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub ref_doc_id: String,
    pub text: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// The synthesized answer plus the chunks it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub sources: Vec<SearchResult>,
}

/// Answers natural language questions over the indexed documents.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, query: SearchQuery) -> Result<QueryResponse>;
}
