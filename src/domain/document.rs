use serde::{Deserialize, Serialize};

/// A single top-level JSON object as found in the import file.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// A document read back from the document collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// The database identifier (`_id`) rendered as a string.
    pub id: String,
    pub fields: JsonObject,
}

impl SourceDocument {
    pub fn new(id: impl Into<String>, fields: JsonObject) -> Self {
        Self { id: id.into(), fields }
    }
}

/// One embedded chunk of a source document, ready for the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique per chunk.
    pub id: String,
    /// Back-reference to `SourceDocument::id`.
    pub ref_doc_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}
