//! Query Logger
//!
//! One structured summary event per query, plus a bounded in-memory history
//! of recent queries.

use crate::cache::{CacheStats, Served};
use crate::query::StageReport;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "easybi_engine=info";

/// Install the global `fmt` subscriber. `RUST_LOG` overrides the default
/// filter. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Query execution log entry
#[derive(Debug, Clone, Serialize)]
pub struct QueryLogEntry {
    pub timestamp: DateTime<Utc>,
    pub query_id: String,
    pub locator: String,
    pub served: Option<Served>,
    pub rows_returned: usize,
    pub execution_time_ms: u64,
    pub stages: Vec<StageReport>,
    pub cache: CacheStats,
    pub success: bool,
    pub error_message: Option<String>,
}

impl QueryLogEntry {
    pub fn new(locator: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            query_id: uuid::Uuid::new_v4().to_string(),
            locator: locator.to_string(),
            served: None,
            rows_returned: 0,
            execution_time_ms: 0,
            stages: Vec::new(),
            cache: CacheStats::default(),
            success: false,
            error_message: None,
        }
    }

    /// `stage=outcome` pairs in pipeline order.
    pub fn stage_summary(&self) -> String {
        self.stages
            .iter()
            .map(|r| format!("{}={}", r.stage, r.outcome))
            .join(", ")
    }

    pub fn emit(&self) {
        if self.success {
            info!(
                query_id = %self.query_id,
                locator = %self.locator,
                served = ?self.served,
                rows = self.rows_returned,
                elapsed_ms = self.execution_time_ms,
                cache_hits = self.cache.hits,
                cache_misses = self.cache.misses,
                stages = %self.stage_summary(),
                "query completed"
            );
        } else {
            warn!(
                query_id = %self.query_id,
                locator = %self.locator,
                elapsed_ms = self.execution_time_ms,
                error = self.error_message.as_deref().unwrap_or(""),
                "query failed"
            );
        }
    }
}

/// Keeps the most recent query log entries.
#[derive(Debug)]
pub struct QueryLogger {
    recent: Mutex<VecDeque<QueryLogEntry>>,
    capacity: usize,
}

impl QueryLogger {
    pub fn new(capacity: usize) -> Self {
        Self {
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Emit the summary event and remember the entry.
    pub fn log_query(&self, entry: QueryLogEntry) {
        entry.emit();
        let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent.push_back(entry);
        while recent.len() > self.capacity {
            recent.pop_front();
        }
    }

    /// Most recent first.
    pub fn recent(&self, limit: usize) -> Vec<QueryLogEntry> {
        let recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent.iter().rev().take(limit).cloned().collect()
    }
}

impl Default for QueryLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Stage, StageOutcome};

    #[test]
    fn test_stage_summary() {
        let mut entry = QueryLogEntry::new("sales.csv");
        entry.stages = vec![
            StageReport {
                stage: Stage::DateFilter,
                outcome: StageOutcome::not_requested(),
            },
            StageReport {
                stage: Stage::Sort,
                outcome: StageOutcome::Applied { rows_in: 2, rows_out: 2 },
            },
        ];
        assert_eq!(entry.stage_summary(), "date_filter=skipped, sort=applied (2 -> 2 rows)");
    }

    #[test]
    fn test_logger_keeps_most_recent() {
        let logger = QueryLogger::new(2);
        for name in ["a", "b", "c"] {
            logger.log_query(QueryLogEntry::new(name));
        }
        let recent: Vec<String> = logger.recent(10).into_iter().map(|e| e.locator).collect();
        assert_eq!(recent, vec!["c", "b"]);
    }
}
