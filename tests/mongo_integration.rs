use anyhow::Result;
use mongo_rag::application::ImportService;
use mongo_rag::domain::{DocumentStore, JsonObject};
use mongo_rag::infrastructure::{mongo, MongoDocumentStore};
use serde_json::json;
use std::sync::Arc;
use testcontainers_modules::mongo::Mongo;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::testcontainers::ContainerAsync;

async fn setup_store(collection: &str) -> Result<(MongoDocumentStore, ContainerAsync<Mongo>)> {
    let container = Mongo::default().start().await?;
    let port = container.get_host_port_ipv4(27017).await?;
    let client = mongo::connect(&format!("mongodb://localhost:{}", port)).await?;
    mongo::ping(&client).await?;
    let store = MongoDocumentStore::new(&client.database("tiny_tweets_db"), collection)?;
    Ok((store, container))
}

fn tweets() -> Vec<JsonObject> {
    vec![
        json!({ "full_text": "Web frameworks are mostly fine.", "lang": "en", "favorite_count": 3 }),
        json!({ "full_text": "I still like dogs more than cats.", "lang": "en", "favorite_count": 10 }),
        json!({ "full_text": "Hola mundo", "lang": "es", "entities": { "hashtags": [] } }),
    ]
    .into_iter()
    .filter_map(|v| v.as_object().cloned())
    .collect()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_import_count_equals_input_length() -> Result<()> {
    let (store, _container) = setup_store("tiny_tweets_collection").await?;
    let service = ImportService::new(Arc::new(store));

    let report = service.import(tweets()).await?;
    assert_eq!(report.inserted, 3);
    assert_eq!(report.collection_count, 3);
    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_find_returns_fields_and_applies_filter() -> Result<()> {
    let (store, _container) = setup_store("filtered").await?;
    store.insert_many(tweets()).await?;

    let all = store.find(JsonObject::new()).await?;
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|doc| doc.id.len() == 24), "ids should be ObjectId hex");
    assert!(all.iter().all(|doc| !doc.fields.contains_key("_id")));

    let filter = json!({ "lang": "es" }).as_object().cloned().unwrap_or_default();
    let spanish = store.find(filter).await?;
    assert_eq!(spanish.len(), 1);
    assert_eq!(spanish[0].fields["full_text"], "Hola mundo");
    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_import_empty_array_inserts_nothing() -> Result<()> {
    let (store, _container) = setup_store("empty").await?;
    let service = ImportService::new(Arc::new(store));
    let report = service.import(Vec::new()).await?;
    assert_eq!(report.inserted, 0);
    assert_eq!(report.collection_count, 0);
    Ok(())
}
