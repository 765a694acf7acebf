//! Data Source Registry - id to `{locator, expected columns}` mapping
//!
//! Persisted as a JSON array (`datasources.json`). Expected columns are
//! informational; queries never validate against them.

use crate::error::{EngineError, Result};
use crate::ingestion::Locator;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Source kind as entered at setup: `csv`, `excel`, `google_sheets`, ...
    #[serde(rename = "type")]
    pub kind: String,
    /// File path or URL.
    pub path: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl DataSource {
    pub fn locator(&self) -> Locator {
        Locator::new(self.path.clone())
    }
}

/// Registration request; the registry assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDataSource {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DataSourceRegistry {
    path: Option<PathBuf>,
    sources: Vec<DataSource>,
}

impl DataSourceRegistry {
    /// In-memory registry; `save` is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file is an empty registry; so is an
    /// unreadable JSON document, with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let sources = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Vec<DataSource>>(&content) {
                Ok(sources) => sources,
                Err(e) => {
                    warn!("Ignoring malformed registry {}: {}", path.display(), e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        info!("Loaded {} data sources from {}", sources.len(), path.display());
        Ok(Self {
            path: Some(path),
            sources,
        })
    }

    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.sources)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn list(&self) -> &[DataSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<&DataSource> {
        self.sources
            .iter()
            .find(|ds| ds.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("data source '{}'", id)))
    }

    /// Add a source under a fresh UUID v4 id.
    pub fn register(&mut self, new: NewDataSource) -> DataSource {
        let source = DataSource {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            kind: new.kind,
            path: new.path,
            columns: new.columns,
        };
        self.sources.push(source.clone());
        source
    }

    pub fn remove(&mut self, id: &str) -> Result<DataSource> {
        let idx = self
            .sources
            .iter()
            .position(|ds| ds.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("data source '{}'", id)))?;
        Ok(self.sources.remove(idx))
    }
}
