//! Query Engine - request boundary over the table cache and query pipeline
//!
//! Resolves a locator (or registry id) to a cached snapshot, runs the query
//! pipeline over that private copy and projects the result.

use crate::cache::{TableCache, ValidityTracker};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::ingestion::{DefaultLoader, Locator, SourceLoader};
use crate::observability::{QueryLogEntry, QueryLogger};
use crate::projector::{self, QueryResult, TablePreview};
use crate::query::{QueryParams, QueryPipeline};
use crate::registry::DataSourceRegistry;
use crate::table::Table;
use polars::prelude::DataFrame;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub struct QueryEngine {
    cache: TableCache,
    pipeline: QueryPipeline,
    preview_rows: usize,
    logger: QueryLogger,
}

impl QueryEngine {
    /// Engine backed by the default file/HTTP loader.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let loader = DefaultLoader::new(config.fetch_timeout)?;
        Ok(Self::with_loader(config, Arc::new(loader)))
    }

    pub fn with_loader(config: &EngineConfig, loader: Arc<dyn SourceLoader>) -> Self {
        Self {
            cache: TableCache::new(loader, ValidityTracker::new(config.remote_ttl)),
            pipeline: QueryPipeline::new(config.max_fill_periods),
            preview_rows: config.preview_rows,
            logger: QueryLogger::default(),
        }
    }

    pub fn cache(&self) -> &TableCache {
        &self.cache
    }

    pub fn logger(&self) -> &QueryLogger {
        &self.logger
    }

    /// Run `params` against the table behind `locator`. Source read failures
    /// are errors; an empty result is not.
    pub async fn query_table(
        &self,
        locator: &Locator,
        params: &QueryParams,
        force_refresh: bool,
    ) -> Result<QueryResult> {
        let started = Instant::now();
        let mut entry = QueryLogEntry::new(locator.as_str());

        let outcome = self.run_query(locator, params, force_refresh, &mut entry).await;

        entry.execution_time_ms = started.elapsed().as_millis() as u64;
        entry.cache = self.cache.stats();
        match &outcome {
            Ok(result) => {
                entry.success = true;
                entry.rows_returned = result.len();
            }
            Err(e) => entry.error_message = Some(e.to_string()),
        }
        self.logger.log_query(entry);

        outcome
    }

    async fn run_query(
        &self,
        locator: &Locator,
        params: &QueryParams,
        force_refresh: bool,
        entry: &mut QueryLogEntry,
    ) -> Result<QueryResult> {
        let snapshot = self.cache.lookup(locator, force_refresh).await?;
        entry.served = Some(snapshot.served);

        let output = self.pipeline.run(snapshot.table, params);
        let result = projector::project(&output.table);
        entry.stages = output.reports;
        Ok(result)
    }

    /// Resolve a registry id, then query its locator.
    pub async fn query_datasource(
        &self,
        registry: &DataSourceRegistry,
        id: &str,
        params: &QueryParams,
        force_refresh: bool,
    ) -> Result<QueryResult> {
        let locator = registry.get(id)?.locator();
        debug!("Data source {} resolves to {}", id, locator);
        self.query_table(&locator, params, force_refresh).await
    }

    /// Owned snapshot of the full table.
    pub async fn load_table(&self, locator: &Locator, force_refresh: bool) -> Result<Table> {
        self.cache.get(locator, force_refresh).await
    }

    /// First rows and total row count, read fresh from the source. The
    /// fresh table replaces any cached one.
    pub async fn preview(&self, locator: &Locator) -> Result<TablePreview> {
        let table = self.cache.get(locator, true).await?;
        Ok(projector::preview(&table, self.preview_rows))
    }

    /// Cached table as a polars frame for analysis consumers.
    pub async fn analysis_frame(&self, locator: &Locator) -> Result<DataFrame> {
        self.cache.get(locator, false).await?.to_dataframe()
    }
}
