use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::chunking::chunk_text;
use crate::config::AppConfig;
use crate::domain::{DocumentStore, Embedder, EmbeddingRecord, JsonObject, SourceDocument, VectorRepository};

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("document {ref_doc_id} has no field '{field}'")]
    MissingField { ref_doc_id: String, field: String },
    #[error("embedder returned {got} vectors for {expected} texts")]
    EmbeddingCountMismatch { expected: usize, got: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexOptions {
    pub field_names: Vec<String>,
    pub field_separator: String,
    pub query_filter: JsonObject,
    pub chunk_size: usize,
    pub batch_size: usize,
    pub show_progress: bool,
}

impl IndexOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            field_names: config.index.field_names.clone(),
            field_separator: config.index.field_separator.clone(),
            query_filter: config
                .index
                .query_filter
                .as_ref()
                .and_then(|f| f.as_object().cloned())
                .unwrap_or_default(),
            chunk_size: config.index.chunk_size,
            batch_size: config.embedding.batch_size,
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub documents: usize,
    pub records: usize,
    /// Length of the stored vectors, as produced by the embedder.
    pub dimension: usize,
}

/// Joins the configured fields of a document into the text that gets embedded.
pub fn extract_text(
    document: &SourceDocument,
    field_names: &[String],
    separator: &str,
) -> Result<String, IndexError> {
    let values = field_names
        .iter()
        .map(|field| match document.fields.get(field) {
            Some(serde_json::Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(IndexError::MissingField {
                ref_doc_id: document.id.clone(),
                field: field.clone(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(values.join(separator))
}

struct PendingChunk {
    ref_doc_id: String,
    chunk_index: usize,
    text: String,
}

/// Reads the document collection, embeds it and fills the vector store.
pub struct IndexService {
    documents: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorRepository>,
    options: IndexOptions,
}

impl IndexService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorRepository>,
        options: IndexOptions,
    ) -> Self {
        Self { documents, embedder, vectors, options }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "Generating embeddings {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}]",
        ) {
            bar.set_style(style);
        }
        bar
    }

    pub async fn run(&self) -> Result<IndexReport> {
        let documents = self.documents.find(self.options.query_filter.clone()).await?;
        info!("Loaded {} documents to index.", documents.len());

        let mut pending = Vec::new();
        for document in &documents {
            let text = extract_text(document, &self.options.field_names, &self.options.field_separator)?;
            let chunks = chunk_text(&text, self.options.chunk_size);
            if chunks.is_empty() {
                warn!("Document {} has no text to index, skipping.", document.id);
                continue;
            }
            debug!("Generated {} chunks for document {}", chunks.len(), document.id);
            pending.extend(chunks.into_iter().enumerate().map(|(chunk_index, text)| PendingChunk {
                ref_doc_id: document.id.clone(),
                chunk_index,
                text,
            }));
        }
        info!("Generated {} chunks from {} documents.", pending.len(), documents.len());

        let progress = self.progress_bar(pending.len());
        let mut written = 0;
        for batch in pending.chunks(self.options.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(IndexError::EmbeddingCountMismatch {
                    expected: batch.len(),
                    got: embeddings.len(),
                }
                .into());
            }

            let records: Vec<EmbeddingRecord> = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| EmbeddingRecord {
                    id: Uuid::new_v4().to_string(),
                    ref_doc_id: chunk.ref_doc_id.clone(),
                    text: chunk.text.clone(),
                    embedding,
                    metadata: Some(serde_json::json!({ "chunk_index": chunk.chunk_index })),
                })
                .collect();
            self.vectors.upsert_records(&records).await?;
            written += records.len();
            progress.inc(batch.len() as u64);
        }
        progress.finish_and_clear();

        info!("Stored {} embedding records.", written);
        Ok(IndexReport {
            documents: documents.len(),
            records: written,
            dimension: self.embedder.dimension(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document_store::MockDocumentStore;
    use crate::domain::model::MockEmbedder;
    use crate::domain::vector_repository::MockVectorRepository;
    use mockall::predicate::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn source(id: &str, fields: serde_json::Value) -> SourceDocument {
        SourceDocument::new(id, fields.as_object().cloned().unwrap())
    }

    fn options(batch_size: usize) -> IndexOptions {
        IndexOptions {
            field_names: vec!["full_text".to_string()],
            field_separator: String::new(),
            query_filter: JsonObject::new(),
            chunk_size: 4000,
            batch_size,
            show_progress: false,
        }
    }

    fn fake_embedder() -> MockEmbedder {
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed()
            .returning(|texts| Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect()));
        embedder.expect_dimension().return_const(2usize);
        embedder
    }

    #[test]
    fn test_extract_text_joins_fields() {
        let doc = source("1", json!({ "full_text": "hello", "user": "ann", "likes": 3 }));
        let fields = vec!["user".to_string(), "full_text".to_string(), "likes".to_string()];
        assert_eq!(extract_text(&doc, &fields, " | ").unwrap(), "ann | hello | 3");
        assert_eq!(extract_text(&doc, &fields[1..2], "").unwrap(), "hello");
    }

    #[test]
    fn test_extract_text_missing_field() {
        let doc = source("abc", json!({ "text": "wrong field name" }));
        let err = extract_text(&doc, &["full_text".to_string()], "").unwrap_err();
        assert_eq!(
            err,
            IndexError::MissingField { ref_doc_id: "abc".to_string(), field: "full_text".to_string() }
        );
    }

    #[test]
    fn test_options_from_config() {
        let mut config = AppConfig::default();
        config.index.query_filter = Some(json!({ "lang": "en" }));
        config.embedding.batch_size = 4;
        let options = IndexOptions::from_config(&config);
        assert_eq!(options.batch_size, 4);
        assert_eq!(options.query_filter["lang"], "en");
        assert_eq!(options.field_names, vec!["full_text".to_string()]);
    }

    #[tokio::test]
    async fn test_run_embeds_every_document_in_batches() -> Result<()> {
        let mut documents = MockDocumentStore::new();
        documents.expect_find().with(eq(JsonObject::new())).returning(|_| {
            Ok((0..5)
                .map(|i| source(&format!("doc{}", i), json!({ "full_text": format!("tweet {}", i) })))
                .collect())
        });

        let stored = Arc::new(Mutex::new(Vec::<EmbeddingRecord>::new()));
        let batch_sizes = Arc::new(Mutex::new(Vec::new()));
        let mut vectors = MockVectorRepository::new();
        {
            let stored = stored.clone();
            let batch_sizes = batch_sizes.clone();
            vectors.expect_upsert_records().returning(move |records| {
                batch_sizes.lock().unwrap().push(records.len());
                stored.lock().unwrap().extend_from_slice(records);
                Ok(())
            });
        }

        let service = IndexService::new(
            Arc::new(documents),
            Arc::new(fake_embedder()),
            Arc::new(vectors),
            options(2),
        );
        let report = service.run().await?;

        assert_eq!(report, IndexReport { documents: 5, records: 5, dimension: 2 });
        assert_eq!(*batch_sizes.lock().unwrap(), vec![2, 2, 1]);
        let stored = stored.lock().unwrap();
        assert_eq!(stored[4].ref_doc_id, "doc4");
        assert_eq!(stored[4].text, "tweet 4");
        assert_eq!(stored[4].embedding, vec![7.0, 1.0]);
        assert_eq!(stored[4].metadata, Some(json!({ "chunk_index": 0 })));
        assert_ne!(stored[0].id, stored[1].id);
        Ok(())
    }

    #[tokio::test]
    async fn test_run_passes_filter_and_skips_empty_text() -> Result<()> {
        let filter = json!({ "lang": "en" }).as_object().cloned().unwrap();
        let mut documents = MockDocumentStore::new();
        documents.expect_find().with(eq(filter.clone())).times(1).returning(|_| {
            Ok(vec![
                source("a", json!({ "full_text": "" })),
                source("b", json!({ "full_text": "kept" })),
            ])
        });
        let mut vectors = MockVectorRepository::new();
        vectors
            .expect_upsert_records()
            .withf(|records| records.len() == 1 && records[0].ref_doc_id == "b")
            .times(1)
            .returning(|_| Ok(()));

        let mut opts = options(10);
        opts.query_filter = filter;
        let service = IndexService::new(Arc::new(documents), Arc::new(fake_embedder()), Arc::new(vectors), opts);
        let report = service.run().await?;
        assert_eq!(report, IndexReport { documents: 2, records: 1, dimension: 2 });
        Ok(())
    }

    #[tokio::test]
    async fn test_run_fails_on_missing_field_before_embedding() {
        let mut documents = MockDocumentStore::new();
        documents
            .expect_find()
            .returning(|_| Ok(vec![source("x", json!({ "body": "no full_text here" }))]));
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().never();
        let mut vectors = MockVectorRepository::new();
        vectors.expect_upsert_records().never();

        let service = IndexService::new(Arc::new(documents), Arc::new(embedder), Arc::new(vectors), options(10));
        let err = service.run().await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<IndexError>(),
            Some(&IndexError::MissingField { ref_doc_id: "x".to_string(), field: "full_text".to_string() })
        );
    }

    #[tokio::test]
    async fn test_run_rejects_short_embedding_response() {
        let mut documents = MockDocumentStore::new();
        documents.expect_find().returning(|_| {
            Ok(vec![
                source("a", json!({ "full_text": "one" })),
                source("b", json!({ "full_text": "two" })),
            ])
        });
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|_| Ok(vec![vec![0.0, 1.0]]));
        let mut vectors = MockVectorRepository::new();
        vectors.expect_upsert_records().never();

        let service = IndexService::new(Arc::new(documents), Arc::new(embedder), Arc::new(vectors), options(10));
        let err = service.run().await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<IndexError>(),
            Some(&IndexError::EmbeddingCountMismatch { expected: 2, got: 1 })
        );
    }

    #[tokio::test]
    async fn test_run_with_no_documents_writes_nothing() -> Result<()> {
        let mut documents = MockDocumentStore::new();
        documents.expect_find().returning(|_| Ok(Vec::new()));
        let mut vectors = MockVectorRepository::new();
        vectors.expect_upsert_records().never();

        let service = IndexService::new(Arc::new(documents), Arc::new(fake_embedder()), Arc::new(vectors), options(10));
        assert_eq!(service.run().await?, IndexReport { documents: 0, records: 0, dimension: 2 });
        Ok(())
    }

    #[tokio::test]
    async fn test_report_dimension_comes_from_embedder_not_config() -> Result<()> {
        use crate::infrastructure::atlas_vector_store::search_index_definition;

        let mut config = AppConfig::default();
        config.embedding.dimensions = 1536;

        let mut documents = MockDocumentStore::new();
        documents
            .expect_find()
            .returning(|_| Ok(vec![source("a", json!({ "full_text": "local model" }))]));
        // A local model producing shorter vectors than configured
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|texts| Ok(texts.iter().map(|_| vec![0.5; 384]).collect()));
        embedder.expect_dimension().return_const(384usize);
        let mut vectors = MockVectorRepository::new();
        vectors
            .expect_upsert_records()
            .withf(|records| records[0].embedding.len() == 384)
            .returning(|_| Ok(()));

        let service = IndexService::new(
            Arc::new(documents),
            Arc::new(embedder),
            Arc::new(vectors),
            IndexOptions::from_config(&config),
        );
        let report = service.run().await?;
        assert_eq!(report.dimension, 384);
        assert_eq!(search_index_definition(report.dimension)["fields"][0]["numDimensions"], 384);
        Ok(())
    }
}
