use anyhow::{anyhow, Context};
use clap::Parser;
use mongo_rag::application::IndexOptions;
use mongo_rag::config::{self, VectorBackend};
use mongo_rag::infrastructure::atlas_vector_store::search_index_definition;
use mongo_rag::initialization::build_index_service;

/// Embed every document in the collection and store the vectors.
#[derive(Parser, Debug)]
#[command(name = "build_index", version)]
struct Args {
    /// Comma separated fields to embed, overriding `index.field_names`
    #[arg(long, value_delimiter = ',')]
    fields: Option<Vec<String>>,

    /// JSON object selecting which documents to index, e.g. '{"lang": "en"}'
    #[arg(long)]
    filter: Option<String>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = config::load_config()?;

    let mut options = IndexOptions::from_config(&config);
    options.show_progress = !args.no_progress;
    if let Some(fields) = args.fields {
        if fields.is_empty() {
            return Err(anyhow!("--fields must name at least one field"));
        }
        options.field_names = fields;
    }
    if let Some(filter) = args.filter {
        let value: serde_json::Value =
            serde_json::from_str(&filter).context("--filter is not valid JSON")?;
        options.query_filter = value
            .as_object()
            .cloned()
            .ok_or_else(|| anyhow!("--filter must be a JSON object"))?;
    }

    let service = build_index_service(&config, options).await?;
    let report = service.run().await?;
    println!(
        "Indexed {} documents into {} embedding records",
        report.documents, report.records
    );

    if config.vector_store.backend == VectorBackend::Atlas {
        println!(
            "\nCreate a vector search index named '{}' on {}.{} with this definition:\n{}",
            config.mongodb.vector_index,
            config.mongodb.database,
            config.mongodb.vectors,
            serde_json::to_string_pretty(&search_index_definition(report.dimension))?
        );
    }
    Ok(())
}
