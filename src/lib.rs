pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod initialization;
pub mod server;

/// Re-export necessary items for the binaries and tests
pub use application::{ImportService, IndexService, QueryService};
pub use config::{load_config, AppConfig};
pub use domain::{QueryEngine, QueryResponse, SearchQuery, SearchResult};
pub use server::{create_router, AppState, EngineSlot};
