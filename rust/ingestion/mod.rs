//! Ingestion Module - turns a source locator into a freshly parsed `Table`
//!
//! - Local files: CSV and workbook formats, chosen by extension
//! - Remote URLs: fetched over HTTP as CSV (or as a workbook when the path
//!   says so), with Google Sheets edit URLs rewritten to their CSV export
//!
//! Loading is stateless; caching lives in `crate::cache`.

pub mod csv_connector;
pub mod loader;
pub mod locator;
pub mod spreadsheet;

pub use csv_connector::parse_csv;
pub use loader::{DefaultLoader, SourceLoader};
pub use locator::{Locator, Origin, RemoteTarget, SheetRef, SourceFormat};
pub use spreadsheet::parse_workbook;

use std::collections::HashSet;

/// Make header names usable as column names: blank headers become
/// `Unnamed: {index}` and repeated names get the first free `.N` suffix.
pub(crate) fn unique_headers<I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let named: Vec<String> = raw
        .into_iter()
        .enumerate()
        .map(|(idx, h)| if h.trim().is_empty() { format!("Unnamed: {}", idx) } else { h })
        .collect();

    let reserved: HashSet<String> = named.iter().cloned().collect();
    let mut used: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(named.len());

    for name in named {
        if used.insert(name.clone()) {
            out.push(name);
            continue;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}.{}", name, n);
            if !reserved.contains(&candidate) && !used.contains(&candidate) {
                used.insert(candidate.clone());
                out.push(candidate);
                break;
            }
            n += 1;
        }
    }

    out
}
