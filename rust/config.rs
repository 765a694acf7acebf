//! Engine configuration from `EASYBI_*` environment variables.

use crate::cache::ValidityTracker;
use crate::error::{EngineError, Result};
use crate::query::DEFAULT_MAX_FILL_PERIODS;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub remote_ttl: Duration,
    pub fetch_timeout: Duration,
    pub preview_rows: usize,
    pub max_fill_periods: usize,
    pub registry_path: PathBuf,
    pub bind_addr: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            remote_ttl: ValidityTracker::DEFAULT_REMOTE_TTL,
            fetch_timeout: Duration::from_secs(30),
            preview_rows: 5,
            max_fill_periods: DEFAULT_MAX_FILL_PERIODS,
            registry_path: PathBuf::from("datasources.json"),
            bind_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

impl EngineConfig {
    /// Read the process environment. Call `dotenv::dotenv()` first to pick up
    /// a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; unset variables keep their
    /// defaults, unparsable ones are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            remote_ttl: parse_var(&lookup, "EASYBI_REMOTE_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.remote_ttl),
            fetch_timeout: parse_var(&lookup, "EASYBI_FETCH_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            preview_rows: parse_var(&lookup, "EASYBI_PREVIEW_ROWS")?.unwrap_or(defaults.preview_rows),
            max_fill_periods: parse_var(&lookup, "EASYBI_MAX_FILL_PERIODS")?
                .unwrap_or(defaults.max_fill_periods),
            registry_path: lookup("EASYBI_REGISTRY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.registry_path),
            bind_addr: lookup("EASYBI_BIND_ADDR").unwrap_or(defaults.bind_addr),
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| EngineError::Config(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(None),
    }
}
