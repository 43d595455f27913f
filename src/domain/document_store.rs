use anyhow::Result;
use async_trait::async_trait;

use super::document::{JsonObject, SourceDocument};

/// General-purpose document collection the raw records live in.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts every record in one batch and returns how many were written.
    async fn insert_many(&self, records: Vec<JsonObject>) -> Result<usize>;

    /// Total number of documents currently in the collection.
    async fn count(&self) -> Result<u64>;

    /// Returns every document matching `filter` (an empty filter matches all).
    async fn find(&self, filter: JsonObject) -> Result<Vec<SourceDocument>>;
}
