pub mod chunking;
pub mod import_service;
pub mod index_service;
pub mod query_service;

pub use import_service::{ImportReport, ImportService};
pub use index_service::{IndexError, IndexOptions, IndexReport, IndexService};
pub use query_service::{QueryOptions, QueryService};
