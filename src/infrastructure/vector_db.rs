use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Use the re-exported module path for Qdrant internally
pub use qdrant_client;
use self::qdrant_client::qdrant::value::Kind as QdrantValueKind;
use self::qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use self::qdrant_client::{Payload, Qdrant};

use crate::domain::{EmbeddingRecord, SearchResult, VectorRepository};

/// What each Qdrant point carries besides its vector.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecordPayload {
    pub id: String,
    pub ref_doc_id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl From<&EmbeddingRecord> for RecordPayload {
    fn from(record: &EmbeddingRecord) -> Self {
        Self {
            id: record.id.clone(),
            ref_doc_id: record.ref_doc_id.clone(),
            text: record.text.clone(),
            metadata: record.metadata.clone(),
        }
    }
}

/// Self-hosted alternative to Atlas: embedding records as points in a Qdrant collection.
pub struct QdrantVectorStore {
    client: Box<Qdrant>,
    collection_name: String,
    vector_size: u64,
}

impl QdrantVectorStore {
    /// Creates a new store over `collection_name`, whose vectors have `vector_size` dimensions.
    pub fn new(client: Box<Qdrant>, collection_name: String, vector_size: u64) -> Result<Self> {
        if collection_name.is_empty() {
            return Err(anyhow!("Collection name cannot be empty"));
        }
        if vector_size == 0 {
            return Err(anyhow!("Vector size must be greater than zero"));
        }
        Ok(Self { client, collection_name, vector_size })
    }

    pub fn connect(url: &str, collection_name: String, vector_size: u64) -> Result<Self> {
        let client = Qdrant::from_url(url).build()?;
        Self::new(Box::new(client), collection_name, vector_size)
    }

    /// Creates the collection (cosine distance) unless it already exists.
    pub async fn initialize_collection(&self) -> Result<()> {
        log::info!("Checking if collection '{}' exists...", self.collection_name);
        if self.client.collection_exists(self.collection_name.clone()).await? {
            log::info!("Collection '{}' already exists.", self.collection_name);
            return Ok(());
        }

        log::info!(
            "Creating collection '{}' with size {} and distance Cosine...",
            self.collection_name,
            self.vector_size
        );
        let create_builder = CreateCollectionBuilder::new(self.collection_name.clone())
            .vectors_config(VectorParamsBuilder::new(self.vector_size, Distance::Cosine));
        match self.client.create_collection(create_builder).await {
            Ok(_) => {
                log::info!("Successfully created collection '{}'.", self.collection_name);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to create collection '{}': {}", self.collection_name, e);
                Err(anyhow!("Failed to create collection: {}", e))
            }
        }
    }

    fn to_point(record: &EmbeddingRecord) -> Result<PointStruct> {
        let payload_value = serde_json::to_value(RecordPayload::from(record))?;
        let payload = Payload::try_from(payload_value)
            .map_err(|e| anyhow!("Failed to build Qdrant payload for record '{}': {}", record.id, e))?;
        Ok(PointStruct::new(record.id.clone(), record.embedding.clone(), payload))
    }

    /// Converts a point payload back into the struct it was written from.
    pub fn payload_to_record(payload: HashMap<String, QdrantValue>) -> Result<RecordPayload> {
        let map = payload
            .into_iter()
            .map(|(key, value)| (key, qdrant_value_to_json(value)))
            .collect::<serde_json::Map<_, _>>();
        Ok(serde_json::from_value(serde_json::Value::Object(map))?)
    }
}

fn qdrant_value_to_json(value: QdrantValue) -> serde_json::Value {
    match value.kind {
        Some(QdrantValueKind::NullValue(_)) | None => serde_json::Value::Null,
        Some(QdrantValueKind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(QdrantValueKind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(QdrantValueKind::IntegerValue(i)) => serde_json::Value::Number(i.into()),
        Some(QdrantValueKind::StringValue(s)) => serde_json::Value::String(s),
        Some(QdrantValueKind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(qdrant_value_to_json).collect())
        }
        Some(QdrantValueKind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .into_iter()
                .map(|(key, value)| (key, qdrant_value_to_json(value)))
                .collect(),
        ),
    }
}

#[async_trait]
impl VectorRepository for QdrantVectorStore {
    async fn upsert_records(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if records.is_empty() {
            log::info!("No embedding records provided for upsert.");
            return Ok(());
        }
        let points = records
            .iter()
            .map(Self::to_point)
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "Upserting {} points into collection '{}'...",
            points.len(),
            self.collection_name
        );
        let upsert_builder = UpsertPointsBuilder::new(self.collection_name.clone(), points).wait(true);
        match self.client.upsert_points(upsert_builder).await {
            Ok(response) => {
                log::debug!("Upsert response: {:?}", response);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to upsert points into collection '{}': {}", self.collection_name, e);
                Err(anyhow!("Qdrant upsert failed: {}", e))
            }
        }
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        if query_vector.len() as u64 != self.vector_size {
            return Err(anyhow!(
                "Query vector dimension ({}) does not match collection dimension ({})",
                query_vector.len(),
                self.vector_size
            ));
        }

        log::info!("Searching in collection '{}' with limit {}...", self.collection_name, limit);
        let mut request =
            SearchPointsBuilder::new(self.collection_name.clone(), query_vector, limit as u64)
                .with_payload(true);
        if let Some(threshold) = score_threshold {
            request = request.score_threshold(threshold);
        }

        let response = self.client.search_points(request).await.map_err(|e| {
            log::error!("Qdrant search failed in collection '{}': {}", self.collection_name, e);
            anyhow!("Qdrant search failed: {}", e)
        })?;

        let results: Vec<SearchResult> = response
            .result
            .into_iter()
            .filter_map(|scored_point| {
                if scored_point.payload.is_empty() {
                    log::warn!("Search result point {:?} has no payload, skipping.", scored_point.id);
                    return None;
                }
                match Self::payload_to_record(scored_point.payload) {
                    Ok(payload) => Some(SearchResult {
                        id: payload.id,
                        ref_doc_id: payload.ref_doc_id,
                        text: payload.text,
                        score: scored_point.score,
                        metadata: payload.metadata,
                    }),
                    Err(e) => {
                        log::error!("Failed to decode payload of point {:?}: {}", scored_point.id, e);
                        None
                    }
                }
            })
            .collect();

        log::info!("Search returned {} results.", results.len());
        Ok(results)
    }
}
