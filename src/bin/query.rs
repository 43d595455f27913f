use clap::builder::RangedU64ValueParser;
use clap::Parser;
use mongo_rag::config;
use mongo_rag::domain::{QueryEngine, SearchQuery};
use mongo_rag::initialization::build_query_service;

const DEFAULT_QUESTION: &str = "What does the author think of web frameworks?";

/// Ask one question against the indexed documents.
#[derive(Parser, Debug)]
#[command(name = "query", version)]
struct Args {
    #[arg(default_value = DEFAULT_QUESTION)]
    question: String,

    /// Number of nearest chunks to retrieve, overriding `query.similarity_top_k`
    #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    top_k: Option<usize>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = config::load_config()?;
    let engine = build_query_service(&config).await?;

    let query = SearchQuery { text: args.question, limit: args.top_k };
    let response = engine.query(query).await?;
    for source in &response.sources {
        log::debug!("source {} (doc {}) score={:.4}", source.id, source.ref_doc_id, source.score);
    }
    println!("{}", response.response);
    Ok(())
}
