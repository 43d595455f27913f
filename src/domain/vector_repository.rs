use anyhow::Result;
use async_trait::async_trait;

use super::document::EmbeddingRecord;
use super::query::SearchResult;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Stores embedding records in the vector collection.
    async fn upsert_records(&self, records: &[EmbeddingRecord]) -> Result<()>;

    /// Nearest-neighbour lookup for `query_vector`, best match first.
    /// Results scoring below `score_threshold` are dropped when one is given.
    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>>;
}
