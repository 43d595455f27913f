use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use log;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::{Collection, Database};

use crate::domain::{EmbeddingRecord, SearchResult, VectorRepository};

/// Field holding the vector; the search index must be defined on this path.
pub const EMBEDDING_KEY: &str = "embedding";

/// Upper bound Atlas accepts for `numCandidates`.
pub const MAX_NUM_CANDIDATES: i64 = 10_000;

/// Atlas Vector Search over a MongoDB collection of embedding records.
///
/// Writes go through the regular driver. Reads use the `$vectorSearch`
/// aggregation stage, which only works once a vector search index named
/// `index_name` has been created on the collection (Atlas UI or API).
pub struct AtlasVectorStore {
    collection: Collection<Document>,
    index_name: String,
}

impl AtlasVectorStore {
    pub fn new(database: &Database, collection_name: &str, index_name: String) -> Result<Self> {
        if collection_name.is_empty() {
            return Err(anyhow!("Collection name cannot be empty"));
        }
        if index_name.is_empty() {
            return Err(anyhow!("Vector index name cannot be empty"));
        }
        Ok(Self {
            collection: database.collection::<Document>(collection_name),
            index_name,
        })
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }
}

/// The index definition to paste into the Atlas "JSON Editor" for this collection.
pub fn search_index_definition(dimensions: usize) -> serde_json::Value {
    serde_json::json!({
        "fields": [{
            "type": "vector",
            "path": EMBEDDING_KEY,
            "numDimensions": dimensions,
            "similarity": "cosine"
        }]
    })
}

pub fn record_to_document(record: &EmbeddingRecord) -> Result<Document> {
    let embedding: Vec<Bson> = record
        .embedding
        .iter()
        .map(|v| Bson::Double(f64::from(*v)))
        .collect();
    let mut document = doc! {
        "id": record.id.clone(),
        "ref_doc_id": record.ref_doc_id.clone(),
        "text": record.text.clone(),
        "embedding": embedding,
    };
    if let Some(metadata) = &record.metadata {
        let metadata = bson::to_bson(metadata)
            .with_context(|| format!("Failed to convert metadata of record {}", record.id))?;
        document.insert("metadata", metadata);
    }
    Ok(document)
}

pub fn vector_search_pipeline(index_name: &str, query_vector: &[f32], limit: usize) -> Vec<Document> {
    let query_vector: Vec<Bson> = query_vector
        .iter()
        .map(|v| Bson::Double(f64::from(*v)))
        .collect();
    let limit = limit as i64;
    vec![
        doc! {
            "$vectorSearch": {
                "index": index_name,
                "path": EMBEDDING_KEY,
                "queryVector": query_vector,
                "numCandidates": (limit * 10).min(MAX_NUM_CANDIDATES),
                "limit": limit,
            }
        },
        doc! {
            "$project": {
                "embedding": 0,
                "score": { "$meta": "vectorSearchScore" },
            }
        },
    ]
}

pub fn document_to_result(document: &Document) -> Result<SearchResult> {
    let text = document.get_str("text").context("search hit has no text")?;
    let score = match document.get("score") {
        Some(Bson::Double(score)) => *score as f32,
        Some(Bson::Int32(score)) => *score as f32,
        Some(Bson::Int64(score)) => *score as f32,
        _ => return Err(anyhow!("search hit has no numeric score")),
    };
    Ok(SearchResult {
        id: document.get_str("id").unwrap_or_default().to_string(),
        ref_doc_id: document.get_str("ref_doc_id").unwrap_or_default().to_string(),
        text: text.to_string(),
        score,
        metadata: document
            .get("metadata")
            .cloned()
            .map(Bson::into_relaxed_extjson),
    })
}

#[async_trait]
impl VectorRepository for AtlasVectorStore {
    async fn upsert_records(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if records.is_empty() {
            log::info!("No embedding records provided for upsert.");
            return Ok(());
        }
        let documents = records
            .iter()
            .map(record_to_document)
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "Inserting {} embedding records into collection '{}'...",
            documents.len(),
            self.collection_name()
        );
        let result = self
            .collection
            .insert_many(documents, None)
            .await
            .with_context(|| format!("insert_many into '{}' failed", self.collection_name()))?;
        log::debug!("Inserted {} embedding records.", result.inserted_ids.len());
        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Err(anyhow!("Search limit must be greater than zero"));
        }
        log::info!(
            "Running $vectorSearch on '{}' (index '{}') with limit {}...",
            self.collection_name(),
            self.index_name,
            limit
        );
        let pipeline = vector_search_pipeline(&self.index_name, &query_vector, limit);
        let cursor = self
            .collection
            .aggregate(pipeline, None)
            .await
            .with_context(|| {
                format!(
                    "$vectorSearch on '{}' failed; has the vector search index '{}' been created?",
                    self.collection_name(),
                    self.index_name
                )
            })?;
        let hits: Vec<Document> = cursor.try_collect().await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in &hits {
            match document_to_result(hit) {
                Ok(result) => results.push(result),
                Err(e) => log::warn!("Skipping malformed search hit: {}", e),
            }
        }
        if let Some(threshold) = score_threshold {
            results.retain(|r| r.score >= threshold);
        }
        log::info!("Search returned {} results.", results.len());
        Ok(results)
    }
}
