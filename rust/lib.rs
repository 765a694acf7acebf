pub mod cache;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod observability;
pub mod projector;
pub mod query;
pub mod query_engine;
pub mod registry;
pub mod table;
pub mod time;

pub use cache::{CacheStats, TableCache, ValidityTracker};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use ingestion::{DefaultLoader, Locator, SourceLoader};
pub use projector::{QueryResult, TablePreview};
pub use query::{QueryParams, QueryPipeline};
pub use query_engine::QueryEngine;
pub use registry::{DataSource, DataSourceRegistry, NewDataSource};
pub use table::{Table, Value};
pub use time::TimeBucket;
