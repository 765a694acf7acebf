use crate::error::{EngineError, Result};
use crate::ingestion::csv_connector::parse_csv;
use crate::ingestion::locator::{Locator, Origin, RemoteTarget, SourceFormat};
use crate::ingestion::spreadsheet::parse_workbook;
use crate::table::Table;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, info};

/// Resolves a locator into a freshly parsed table.
///
/// Implementations must be stateless with respect to the cache: every call
/// reads the source again.
#[async_trait]
pub trait SourceLoader: Send + Sync {
    async fn load(&self, locator: &Locator) -> Result<Table>;
}

/// Loader for local files and HTTP(S) sources.
pub struct DefaultLoader {
    http: reqwest::Client,
}

impl DefaultLoader {
    /// `fetch_timeout` bounds every remote request; expiry surfaces as
    /// `SourceUnreachable`.
    pub fn new(fetch_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    async fn load_local(&self, path: &str) -> Result<Table> {
        let format = SourceFormat::from_path(path)
            .ok_or_else(|| EngineError::UnsupportedFormat(path.to_string()))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| EngineError::SourceUnreachable(format!("{}: {}", path, e)))?;

        debug!("Read {} bytes from {}", bytes.len(), path);
        parse_bytes(format, bytes).await
    }

    async fn load_remote(&self, raw: &str) -> Result<Table> {
        let target = RemoteTarget::resolve(raw)?;
        if target.url != raw {
            debug!("Rewrote {} to {}", raw, target.url);
        }

        let response = self
            .http
            .get(&target.url)
            .send()
            .await
            .map_err(|e| EngineError::SourceUnreachable(format!("{}: {}", target.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::SourceUnreachable(format!(
                "{} returned HTTP {}",
                target.url, status
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if content_type.contains("text/html") {
            return Err(EngineError::UnsupportedFormat(format!(
                "{} served {} instead of tabular data",
                target.url, content_type
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| EngineError::SourceUnreachable(format!("{}: {}", target.url, e)))?;

        debug!("Fetched {} bytes from {}", bytes.len(), target.url);
        parse_bytes(target.format, bytes.to_vec()).await
    }
}

#[async_trait]
impl SourceLoader for DefaultLoader {
    async fn load(&self, locator: &Locator) -> Result<Table> {
        let table = match locator.origin() {
            Origin::Local => self.load_local(locator.as_str()).await?,
            Origin::Remote => self.load_remote(locator.as_str()).await?,
        };
        info!(
            "Loaded {}: {} rows, {} columns",
            locator,
            table.height(),
            table.width()
        );
        Ok(table)
    }
}

/// Parsing is CPU-bound; keep it off the async worker threads.
async fn parse_bytes(format: SourceFormat, bytes: Vec<u8>) -> Result<Table> {
    tokio::task::spawn_blocking(move || match format {
        SourceFormat::Csv => parse_csv(&bytes),
        SourceFormat::Spreadsheet => parse_workbook(bytes),
    })
    .await
    .map_err(|e| EngineError::Parse(format!("parser task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn loader() -> DefaultLoader {
        DefaultLoader::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_load_local_csv() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Date,Units").unwrap();
        writeln!(file, "2024-01-01,3").unwrap();

        let locator = Locator::new(file.path().to_string_lossy().to_string());
        let table = loader().load(&locator).await.unwrap();
        assert_eq!(table.columns(), &["Date", "Units"]);
        assert_eq!(table.height(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let locator = Locator::new(file.path().to_string_lossy().to_string());
        let err = loader().load(&locator).await.unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_missing_local_file_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.csv");
        let locator = Locator::new(path.to_string_lossy().to_string());
        let err = loader().load(&locator).await.unwrap_err();
        assert!(matches!(err, EngineError::SourceUnreachable(_)));
    }

    #[tokio::test]
    async fn test_invalid_sheet_url_fails_before_fetch() {
        let locator = Locator::from("https://docs.google.com/spreadsheets/");
        let err = loader().load(&locator).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidSheetUrl(_)));
    }
}
