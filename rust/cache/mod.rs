//! Cache Module - validity-checked, per-locator table snapshots

pub mod table_cache;
pub mod validity;

pub use table_cache::{CacheStats, Served, Snapshot, TableCache};
pub use validity::{CacheEntry, Validity, ValidityTracker};
