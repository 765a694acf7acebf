//! Source locators and Google Sheets URL rewriting.

use crate::error::{EngineError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

lazy_static! {
    static ref SHEET_DOCUMENT_ID: Regex = Regex::new(r"^/spreadsheets(?:/u/\d+)?/d/([^/]+)").unwrap();
    static ref SHEET_EDIT_PATH: Regex =
        Regex::new(r"^/spreadsheets(?:/u/\d+)?/d/([^/]+)/?(?:(?:edit|view)/?)?$").unwrap();
    static ref GID_PARAM: Regex = Regex::new(r"(?:^|[&?#])gid=([0-9]+)").unwrap();
}

const SHEETS_HOST: &str = "docs.google.com";

/// String identifying a tabular source. Two locators are equal iff their
/// strings are equal; no path or URL normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

/// Where a locator's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Local,
    Remote,
}

impl Locator {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn origin(&self) -> Origin {
        let lower = self.0.get(..8).unwrap_or(&self.0).to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Origin::Remote
        } else {
            Origin::Local
        }
    }

    /// Filesystem path for local locators.
    pub fn local_path(&self) -> Option<&Path> {
        match self.origin() {
            Origin::Local => Some(Path::new(&self.0)),
            Origin::Remote => None,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Locator::new(s)
    }
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        Locator(s)
    }
}

/// Container format of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Spreadsheet,
}

impl SourceFormat {
    /// Format implied by a path's extension (case-insensitive).
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(SourceFormat::Csv),
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Some(SourceFormat::Spreadsheet),
            _ => None,
        }
    }
}

/// A Google Sheets document tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRef {
    pub document_id: String,
    pub gid: String,
}

impl SheetRef {
    /// Parse a Sheets edit URL. Returns `Ok(None)` for URLs that are fetched
    /// as they are (non-Sheets, published and export links) and
    /// `InvalidSheetUrl` for Sheets URLs without a document id.
    pub fn parse(url: &Url) -> Result<Option<SheetRef>> {
        if url.host_str() != Some(SHEETS_HOST) || !url.path().starts_with("/spreadsheets") {
            return Ok(None);
        }
        if !SHEET_DOCUMENT_ID.is_match(url.path()) {
            return Err(EngineError::InvalidSheetUrl(url.to_string()));
        }

        // `/d/e/{token}` is the published-to-web namespace, not a document id.
        let document_id = match SHEET_EDIT_PATH.captures(url.path()).and_then(|c| c.get(1)) {
            Some(m) if m.as_str() != "e" => m.as_str().to_string(),
            _ => return Ok(None),
        };

        let gid = [url.query(), url.fragment()]
            .into_iter()
            .flatten()
            .find_map(|part| GID_PARAM.captures(part).and_then(|c| c.get(1)))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "0".to_string());

        Ok(Some(SheetRef { document_id, gid }))
    }

    pub fn export_url(&self) -> String {
        format!(
            "https://{}/spreadsheets/d/{}/export?format=csv&gid={}",
            SHEETS_HOST, self.document_id, self.gid
        )
    }
}

/// The URL actually fetched for a remote locator and how to parse the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub url: String,
    pub format: SourceFormat,
}

impl RemoteTarget {
    pub fn resolve(raw: &str) -> Result<RemoteTarget> {
        let url = Url::parse(raw)
            .map_err(|e| EngineError::SourceUnreachable(format!("invalid URL '{}': {}", raw, e)))?;

        if let Some(sheet) = SheetRef::parse(&url)? {
            return Ok(RemoteTarget {
                url: sheet.export_url(),
                format: SourceFormat::Csv,
            });
        }

        let format = match SourceFormat::from_path(url.path()) {
            Some(SourceFormat::Spreadsheet) => SourceFormat::Spreadsheet,
            _ => SourceFormat::Csv,
        };
        Ok(RemoteTarget {
            url: url.to_string(),
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin() {
        assert_eq!(Locator::from("data/sales.csv").origin(), Origin::Local);
        assert_eq!(Locator::from("/tmp/x.xlsx").origin(), Origin::Local);
        assert_eq!(Locator::from("https://example.com/a.csv").origin(), Origin::Remote);
        assert_eq!(Locator::from("HTTP://example.com/a.csv").origin(), Origin::Remote);
    }

    #[test]
    fn test_locators_are_not_normalized() {
        assert_ne!(Locator::from("./a.csv"), Locator::from("a.csv"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(SourceFormat::from_path("a/b.CSV"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_path("b.xlsx"), Some(SourceFormat::Spreadsheet));
        assert_eq!(SourceFormat::from_path("b.ods"), Some(SourceFormat::Spreadsheet));
        assert_eq!(SourceFormat::from_path("b.json"), None);
        assert_eq!(SourceFormat::from_path("noext"), None);
    }

    #[test]
    fn test_sheet_edit_url_rewritten_to_export() {
        let target = RemoteTarget::resolve(
            "https://docs.google.com/spreadsheets/d/1xOS1vss-ABH_J2O/edit?usp=sharing#gid=123456",
        )
        .unwrap();
        assert_eq!(
            target.url,
            "https://docs.google.com/spreadsheets/d/1xOS1vss-ABH_J2O/export?format=csv&gid=123456"
        );
        assert_eq!(target.format, SourceFormat::Csv);
    }

    #[test]
    fn test_sheet_gid_defaults_to_zero() {
        let url = Url::parse("https://docs.google.com/spreadsheets/d/abc/edit").unwrap();
        let sheet = SheetRef::parse(&url).unwrap().unwrap();
        assert_eq!(sheet.document_id, "abc");
        assert_eq!(sheet.gid, "0");

        let url = Url::parse("https://docs.google.com/spreadsheets/d/abc/edit?gid=42").unwrap();
        assert_eq!(SheetRef::parse(&url).unwrap().unwrap().gid, "42");
    }

    #[test]
    fn test_sheet_without_document_id_is_invalid() {
        let err = RemoteTarget::resolve("https://docs.google.com/spreadsheets/u/0/").unwrap_err();
        assert!(matches!(err, EngineError::InvalidSheetUrl(_)));
    }

    #[test]
    fn test_published_and_export_sheet_urls_pass_through() {
        let published =
            "https://docs.google.com/spreadsheets/d/e/2PACX-1vAbCdEf/pub?gid=0&single=true&output=csv";
        let target = RemoteTarget::resolve(published).unwrap();
        assert_eq!(target.url, published);
        assert_eq!(target.format, SourceFormat::Csv);

        let export = "https://docs.google.com/spreadsheets/d/abc/export?format=csv&gid=7";
        assert_eq!(RemoteTarget::resolve(export).unwrap().url, export);
    }

    #[test]
    fn test_edit_url_variants_are_rewritten() {
        for raw in [
            "https://docs.google.com/spreadsheets/d/abc",
            "https://docs.google.com/spreadsheets/d/abc/",
            "https://docs.google.com/spreadsheets/d/abc/view?gid=5",
            "https://docs.google.com/spreadsheets/u/1/d/abc/edit?gid=5",
        ] {
            let url = Url::parse(raw).unwrap();
            let sheet = SheetRef::parse(&url).unwrap().unwrap();
            assert_eq!(sheet.document_id, "abc", "{}", raw);
        }
    }

    #[test]
    fn test_plain_remote_urls() {
        let csv = RemoteTarget::resolve("https://example.com/export?id=1").unwrap();
        assert_eq!(csv.format, SourceFormat::Csv);
        let xlsx = RemoteTarget::resolve("https://example.com/files/report.xlsx").unwrap();
        assert_eq!(xlsx.format, SourceFormat::Spreadsheet);
    }
}
