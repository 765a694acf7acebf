//! CSV Connector - parses raw CSV bytes into a `Table`

use crate::error::{EngineError, Result};
use crate::ingestion::unique_headers;
use crate::table::{Table, Value};
use csv::ReaderBuilder;

/// Cell texts read as missing.
const NA_MARKERS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A", "<NA>",
];

/// Parse CSV content. The first record is the header.
pub fn parse_csv(bytes: &[u8]) -> Result<Table> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| EngineError::Parse(format!("CSV is not valid UTF-8: {}", e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = rdr.headers()?.iter().map(str::to_string).collect::<Vec<_>>();
    if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
        return Err(EngineError::Parse("no columns to parse from source".to_string()));
    }
    let columns = unique_headers(headers);
    let width = columns.len();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.len() == 1 && record[0].trim().is_empty() && width > 1 {
            continue;
        }
        if record.len() > width {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            return Err(EngineError::Parse(format!(
                "expected {} fields in line {}, saw {}",
                width,
                line,
                record.len()
            )));
        }

        let mut row: Vec<Value> = record.iter().map(coerce_cell).collect();
        row.resize(width, Value::Null);
        rows.push(row);
    }

    Table::new(columns, rows)
}

fn coerce_cell(s: &str) -> Value {
    let trimmed = s.trim();
    if trimmed.is_empty() || NA_MARKERS.contains(&trimmed) {
        return Value::Null;
    }

    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }

    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::Float(f);
        }
    }

    Value::Text(s.to_string())
}
