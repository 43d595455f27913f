use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use log;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, ServerApi, ServerApiVersion};
use mongodb::{Client, Collection, Database};

use crate::domain::{DocumentStore, JsonObject, SourceDocument};

const APP_NAME: &str = "mongo-rag";

/// Opens a client pinned to Stable API version 1.
pub async fn connect(uri: &str) -> Result<Client> {
    let mut options = ClientOptions::parse(uri)
        .await
        .context("Failed to parse MongoDB connection string")?;
    options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
    options.app_name = Some(APP_NAME.to_string());
    Client::with_options(options).context("Failed to create MongoDB client")
}

/// Round-trips a `ping` so a bad URI fails before any real work starts.
pub async fn ping(client: &Client) -> Result<()> {
    client
        .database("admin")
        .run_command(doc! { "ping": 1 }, None)
        .await
        .context("MongoDB ping failed")?;
    log::info!("Pinged MongoDB deployment, connection is live.");
    Ok(())
}

/// Converts an imported record into BSON, keeping keys as they are.
pub fn record_to_document(record: &JsonObject) -> Result<Document> {
    mongodb::bson::to_document(record).context("Failed to convert JSON record to BSON")
}

/// Converts a user supplied filter, honouring extended JSON such as `{"$oid": ...}`.
pub fn filter_to_document(filter: JsonObject) -> Result<Document> {
    match Bson::try_from(serde_json::Value::Object(filter))
        .map_err(|e| anyhow!("Invalid query filter: {}", e))?
    {
        Bson::Document(document) => Ok(document),
        other => Err(anyhow!("Query filter must be a document, got {:?}", other.element_type())),
    }
}

/// Renders an `_id` the way it is referenced from embedding records.
pub fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.clone().into_relaxed_extjson().to_string(),
    }
}

pub fn document_to_source(mut document: Document) -> Result<SourceDocument> {
    let id = document
        .remove("_id")
        .map(|id| id_to_string(&id))
        .ok_or_else(|| anyhow!("Document has no _id"))?;
    match Bson::Document(document).into_relaxed_extjson() {
        serde_json::Value::Object(fields) => Ok(SourceDocument::new(id, fields)),
        _ => Err(anyhow!("Document {} did not convert to a JSON object", id)),
    }
}

/// The collection imported records are written to and read back from.
pub struct MongoDocumentStore {
    collection: Collection<Document>,
}

impl MongoDocumentStore {
    pub fn new(database: &Database, collection_name: &str) -> Result<Self> {
        if collection_name.is_empty() {
            return Err(anyhow!("Collection name cannot be empty"));
        }
        Ok(Self {
            collection: database.collection::<Document>(collection_name),
        })
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn insert_many(&self, records: Vec<JsonObject>) -> Result<usize> {
        if records.is_empty() {
            // The driver rejects an empty batch outright.
            log::info!("No records provided for insert.");
            return Ok(0);
        }
        let documents = records
            .iter()
            .map(record_to_document)
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "Inserting {} documents into collection '{}'...",
            documents.len(),
            self.collection_name()
        );
        let result = self
            .collection
            .insert_many(documents, None)
            .await
            .with_context(|| format!("insert_many into '{}' failed", self.collection_name()))?;
        Ok(result.inserted_ids.len())
    }

    async fn count(&self) -> Result<u64> {
        self.collection
            .count_documents(None, None)
            .await
            .with_context(|| format!("Failed to count documents in '{}'", self.collection_name()))
    }

    async fn find(&self, filter: JsonObject) -> Result<Vec<SourceDocument>> {
        let filter = filter_to_document(filter)?;
        log::debug!("Reading '{}' with filter {:?}", self.collection_name(), filter);
        let cursor = self
            .collection
            .find(filter, None)
            .await
            .with_context(|| format!("find on '{}' failed", self.collection_name()))?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        log::info!(
            "Read {} documents from collection '{}'.",
            documents.len(),
            self.collection_name()
        );
        documents.into_iter().map(document_to_source).collect()
    }
}
