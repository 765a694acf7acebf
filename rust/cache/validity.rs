//! Validity tracking for cached tables
//!
//! Local sources stay valid while the file's modification time is unchanged;
//! remote sources stay valid for a fixed time-to-live after they were loaded.

use crate::ingestion::{Locator, Origin};
use crate::table::Table;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

/// Staleness metadata captured when an entry is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// `None` when the file could not be stat'ed at load time.
    Local { mtime: Option<SystemTime> },
    Remote { loaded_at: Instant },
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub locator: Locator,
    pub table: Arc<Table>,
    pub validity: Validity,
}

impl CacheEntry {
    pub fn origin(&self) -> Origin {
        match self.validity {
            Validity::Local { .. } => Origin::Local,
            Validity::Remote { .. } => Origin::Remote,
        }
    }

    /// Owned copy of the cached table.
    pub fn snapshot(&self) -> Table {
        self.table.as_ref().clone()
    }
}

#[derive(Debug, Clone)]
pub struct ValidityTracker {
    remote_ttl: Duration,
}

impl ValidityTracker {
    pub const DEFAULT_REMOTE_TTL: Duration = Duration::from_secs(300);

    pub fn new(remote_ttl: Duration) -> Self {
        Self { remote_ttl }
    }

    pub fn remote_ttl(&self) -> Duration {
        self.remote_ttl
    }

    /// Capture validity metadata for a load that is about to start.
    pub async fn stamp(&self, locator: &Locator) -> Validity {
        match locator.local_path() {
            Some(path) => Validity::Local {
                mtime: modified_time(path).await,
            },
            None => Validity::Remote {
                loaded_at: Instant::now(),
            },
        }
    }

    pub async fn is_valid(&self, entry: &CacheEntry, locator: &Locator) -> bool {
        match (entry.validity, locator.local_path()) {
            (Validity::Local { mtime: Some(cached) }, Some(path)) => {
                modified_time(path).await == Some(cached)
            }
            (Validity::Local { mtime: None }, _) => false,
            (Validity::Remote { loaded_at }, None) => loaded_at.elapsed() < self.remote_ttl,
            // Origin changed under the same key; never trust the entry.
            _ => false,
        }
    }
}

impl Default for ValidityTracker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REMOTE_TTL)
    }
}

async fn modified_time(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}
