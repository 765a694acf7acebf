use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Source unreachable: {0}")]
    SourceUnreachable(String),

    #[error("Invalid Google Sheets URL: {0}")]
    InvalidSheetUrl(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl EngineError {
    /// True for failures raised while reading a source (as opposed to
    /// registry lookups or local configuration problems).
    pub fn is_source_read_failure(&self) -> bool {
        matches!(
            self,
            EngineError::UnsupportedFormat(_)
                | EngineError::SourceUnreachable(_)
                | EngineError::InvalidSheetUrl(_)
                | EngineError::Parse(_)
        )
    }
}

impl From<polars::error::PolarsError> for EngineError {
    fn from(err: polars::error::PolarsError) -> Self {
        EngineError::Polars(err.to_string())
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
