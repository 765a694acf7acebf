//! Table Cache - locator-keyed snapshots with single-flight loading
//!
//! Each locator owns a slot with its own async lock. The slot map is only
//! touched to find or create a slot, so a slow load for one locator never
//! blocks queries against another. Holding a slot's lock is the right to load
//! that locator; callers queued behind a load reuse its result. Inspection
//! and invalidation go through per-slot flags and never wait on a load.

use crate::cache::validity::{CacheEntry, ValidityTracker};
use crate::error::Result;
use crate::ingestion::{Locator, SourceLoader};
use crate::table::Table;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Default)]
struct Slot {
    entry: Mutex<Option<CacheEntry>>,
    /// Bumped after every installed load.
    generation: AtomicU64,
    /// Mirrors `entry.is_some()`.
    cached: AtomicBool,
    /// Set when an invalidation arrived while the entry lock was busy.
    invalidated: AtomicBool,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub failures: u64,
}

/// How a snapshot was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Served {
    /// A valid cached entry.
    Cached,
    /// A load finished by another caller while this one waited.
    SharedLoad,
    /// This caller performed the load.
    FreshLoad,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub table: Table,
    pub served: Served,
}

pub struct TableCache {
    loader: Arc<dyn SourceLoader>,
    tracker: ValidityTracker,
    slots: DashMap<Locator, Arc<Slot>>,
    counters: Counters,
}

impl std::fmt::Debug for TableCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableCache")
            .field("tracker", &self.tracker)
            .field("slots", &self.slots.len())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl TableCache {
    pub fn new(loader: Arc<dyn SourceLoader>, tracker: ValidityTracker) -> Self {
        Self {
            loader,
            tracker,
            slots: DashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Owned snapshot of the table behind `locator`, loading it if there is
    /// no valid entry or `force_refresh` is set.
    pub async fn get(&self, locator: &Locator, force_refresh: bool) -> Result<Table> {
        Ok(self.lookup(locator, force_refresh).await?.table)
    }

    /// Like [`TableCache::get`], also reporting how the snapshot was served.
    pub async fn lookup(&self, locator: &Locator, force_refresh: bool) -> Result<Snapshot> {
        let slot = self.slot(locator);
        let observed = slot.generation.load(Ordering::Acquire);
        let mut guard = slot.entry.lock().await;

        if slot.invalidated.swap(false, Ordering::AcqRel) && guard.take().is_some() {
            slot.cached.store(false, Ordering::Release);
            debug!("Dropped invalidated entry for {}", locator);
        }

        if let Some(entry) = guard.as_ref() {
            if slot.generation.load(Ordering::Acquire) != observed {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Reusing load of {} that completed while waiting", locator);
                return Ok(Snapshot {
                    table: entry.snapshot(),
                    served: Served::SharedLoad,
                });
            }
            if !force_refresh && self.tracker.is_valid(entry, locator).await {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {}", locator);
                return Ok(Snapshot {
                    table: entry.snapshot(),
                    served: Served::Cached,
                });
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Cache miss for {} (forced: {}, had entry: {})",
            locator,
            force_refresh,
            guard.is_some()
        );

        // Stamp before loading so a write that races the load shows up as stale.
        let validity = self.tracker.stamp(locator).await;
        let table = match self.loader.load(locator).await {
            Ok(table) => Arc::new(table),
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Loading {} failed: {} (previous entry kept: {})",
                    locator,
                    e,
                    guard.is_some()
                );
                return Err(e);
            }
        };

        *guard = Some(CacheEntry {
            locator: locator.clone(),
            table: Arc::clone(&table),
            validity,
        });
        slot.cached.store(true, Ordering::Release);
        slot.generation.fetch_add(1, Ordering::Release);
        self.counters.loads.fetch_add(1, Ordering::Relaxed);

        Ok(Snapshot {
            table: table.as_ref().clone(),
            served: Served::FreshLoad,
        })
    }

    /// Drop the cached table for `locator`. Returns whether one was cached.
    /// If a load is in flight, its result is discarded by the next lookup.
    pub fn invalidate(&self, locator: &Locator) -> bool {
        let Some(slot) = self.slots.get(locator).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        let removed = match slot.entry.try_lock() {
            Ok(mut guard) => {
                slot.cached.store(false, Ordering::Release);
                guard.take().is_some()
            }
            Err(_) => {
                let cached = slot.cached.load(Ordering::Acquire);
                if cached {
                    slot.invalidated.store(true, Ordering::Release);
                }
                cached
            }
        };
        if removed {
            debug!("Invalidated {}", locator);
        }
        removed
    }

    /// Number of locators with a cached table.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| {
                let slot = s.value();
                slot.cached.load(Ordering::Acquire) && !slot.invalidated.load(Ordering::Acquire)
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            loads: self.counters.loads.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    fn slot(&self, locator: &Locator) -> Arc<Slot> {
        if let Some(slot) = self.slots.get(locator) {
            return Arc::clone(slot.value());
        }
        let slot = self
            .slots
            .entry(locator.clone())
            .or_insert_with(|| Arc::new(Slot::default()));
        Arc::clone(slot.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::table::Value;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingLoader {
        calls: AtomicUsize,
        fail: AtomicBool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl SourceLoader for CountingLoader {
        async fn load(&self, _locator: &Locator) -> Result<Table> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(EngineError::SourceUnreachable("offline".to_string()));
            }
            Table::new(vec!["load".to_string()], vec![vec![Value::Int(n as i64)]])
        }
    }

    fn cache_with(loader: Arc<CountingLoader>) -> TableCache {
        TableCache::new(loader, ValidityTracker::default())
    }

    fn load_number(table: &Table) -> Value {
        table.rows()[0][0].clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_get_is_a_hit() {
        let loader = Arc::new(CountingLoader::default());
        let cache = cache_with(Arc::clone(&loader));
        let locator = Locator::from("https://example.com/a.csv");

        let first = cache.lookup(&locator, false).await.unwrap();
        let second = cache.lookup(&locator, false).await.unwrap();

        assert_eq!(first.served, Served::FreshLoad);
        assert_eq!(second.served, Served::Cached);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, loads: 1, failures: 0 });
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_refresh_reloads() {
        let loader = Arc::new(CountingLoader::default());
        let cache = cache_with(Arc::clone(&loader));
        let locator = Locator::from("https://example.com/a.csv");

        cache.get(&locator, false).await.unwrap();
        let refreshed = cache.get(&locator, true).await.unwrap();
        assert_eq!(load_number(&refreshed), Value::Int(2));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_reloads() {
        let loader = Arc::new(CountingLoader::default());
        let cache = cache_with(Arc::clone(&loader));
        let locator = Locator::from("https://example.com/a.csv");

        cache.get(&locator, false).await.unwrap();
        tokio::time::advance(Duration::from_secs(299)).await;
        cache.get(&locator, false).await.unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let reloaded = cache.get(&locator, false).await.unwrap();
        assert_eq!(load_number(&reloaded), Value::Int(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_previous_entry() {
        let loader = Arc::new(CountingLoader::default());
        let cache = cache_with(Arc::clone(&loader));
        let locator = Locator::from("https://example.com/a.csv");

        cache.get(&locator, false).await.unwrap();
        loader.fail.store(true, Ordering::SeqCst);

        let err = cache.get(&locator, true).await.unwrap_err();
        assert!(matches!(err, EngineError::SourceUnreachable(_)));

        let table = cache.get(&locator, false).await.unwrap();
        assert_eq!(load_number(&table), Value::Int(1));
        assert_eq!(cache.stats().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_load() {
        let loader = Arc::new(CountingLoader {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let cache = Arc::new(cache_with(Arc::clone(&loader)));
        let locator = Locator::from("https://example.com/a.csv");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let locator = locator.clone();
            handles.push(tokio::spawn(async move { cache.get(&locator, false).await }));
        }
        for handle in handles {
            let table = handle.await.unwrap().unwrap();
            assert_eq!(load_number(&table), Value::Int(1));
        }
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_forced_refreshes_share_one_load() {
        let loader = Arc::new(CountingLoader {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let cache = Arc::new(cache_with(Arc::clone(&loader)));
        let locator = Locator::from("https://example.com/a.csv");
        cache.get(&locator, false).await.unwrap();

        let a = {
            let cache = Arc::clone(&cache);
            let locator = locator.clone();
            tokio::spawn(async move { cache.get(&locator, true).await })
        };
        let b = {
            let cache = Arc::clone(&cache);
            let locator = locator.clone();
            tokio::spawn(async move { cache.get(&locator, true).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_reload() {
        let loader = Arc::new(CountingLoader::default());
        let cache = cache_with(Arc::clone(&loader));
        let locator = Locator::from("https://example.com/a.csv");

        assert!(!cache.invalidate(&locator));
        cache.get(&locator, false).await.unwrap();
        assert!(cache.invalidate(&locator));
        assert!(cache.is_empty());

        cache.get(&locator, false).await.unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshots_are_independent() {
        let loader = Arc::new(CountingLoader::default());
        let cache = cache_with(Arc::clone(&loader));
        let locator = Locator::from("https://example.com/a.csv");

        let mut mine = cache.get(&locator, false).await.unwrap();
        mine.retain_rows(|_| false);
        assert_eq!(mine.height(), 0);

        let again = cache.get(&locator, false).await.unwrap();
        assert_eq!(again.height(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inspection_does_not_wait_for_a_load() {
        let loader = Arc::new(CountingLoader {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let cache = Arc::new(cache_with(Arc::clone(&loader)));
        let locator = Locator::from("https://example.com/a.csv");

        let pending = {
            let cache = Arc::clone(&cache);
            let locator = locator.clone();
            tokio::spawn(async move { cache.get(&locator, false).await })
        };
        while loader.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(cache.len(), 0);
        assert!(!cache.invalidate(&locator));

        pending.await.unwrap().unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_during_refresh_discards_result() {
        let loader = Arc::new(CountingLoader {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let cache = Arc::new(cache_with(Arc::clone(&loader)));
        let locator = Locator::from("https://example.com/a.csv");
        cache.get(&locator, false).await.unwrap();

        let refresh = {
            let cache = Arc::clone(&cache);
            let locator = locator.clone();
            tokio::spawn(async move { cache.get(&locator, true).await })
        };
        while loader.calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        assert!(cache.invalidate(&locator));
        assert!(cache.is_empty());
        refresh.await.unwrap().unwrap();

        let table = cache.get(&locator, false).await.unwrap();
        assert_eq!(load_number(&table), Value::Int(3));
    }
}
