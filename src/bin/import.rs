use clap::Parser;
use mongo_rag::application::ImportService;
use mongo_rag::config;
use mongo_rag::initialization::{connect_database, document_store};
use std::path::PathBuf;

/// Load a JSON array of records into the MongoDB collection.
#[derive(Parser, Debug)]
#[command(name = "import", version)]
struct Args {
    /// JSON file holding a single top-level array of objects
    #[arg(short, long, default_value = "tinytweets.json")]
    file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = config::load_config()?;

    let database = connect_database(&config).await?;
    let service = ImportService::new(document_store(&config, &database)?);
    let report = service.import_file(&args.file).await?;

    println!(
        "Inserted {} of {} records into {}.{} ({} documents total)",
        report.inserted,
        report.read,
        config.mongodb.database,
        config.mongodb.collection,
        report.collection_count
    );
    Ok(())
}
