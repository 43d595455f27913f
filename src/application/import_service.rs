use anyhow::Result;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

use crate::domain::{DocumentStore, JsonObject};
use crate::infrastructure::file_system::load_json_array;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Records read from the input.
    pub read: usize,
    /// Records the database acknowledged.
    pub inserted: usize,
    /// Documents in the collection after the import.
    pub collection_count: u64,
}

/// Copies a JSON array of objects into the document collection, unchanged.
pub struct ImportService {
    store: Arc<dyn DocumentStore>,
}

impl ImportService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn import_file(&self, path: &Path) -> Result<ImportReport> {
        let records = load_json_array(path)?;
        self.import(records).await
    }

    pub async fn import(&self, records: Vec<JsonObject>) -> Result<ImportReport> {
        let read = records.len();
        info!("Importing {} records...", read);

        let inserted = self.store.insert_many(records).await?;
        if inserted != read {
            warn!("Read {} records but the database acknowledged {}.", read, inserted);
        }
        let collection_count = self.store.count().await?;
        info!(
            "Import finished: {} inserted, collection now holds {} documents.",
            inserted, collection_count
        );
        Ok(ImportReport { read, inserted, collection_count })
    }
}
