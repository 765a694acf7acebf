//! Workbook (xls/xlsx/xlsm/xlsb/ods) parsing. Reads the first worksheet; its
//! first row is the header.

use crate::error::{EngineError, Result};
use crate::ingestion::unique_headers;
use crate::table::{Table, Value};
use crate::time::parse_timestamp;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

/// Largest magnitude at which an integral float is still exact as an integer.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

pub fn parse_workbook(bytes: Vec<u8>) -> Result<Table> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| EngineError::Parse(format!("cannot open workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| EngineError::Parse("workbook has no worksheets".to_string()))?
        .map_err(|e| EngineError::Parse(format!("cannot read first worksheet: {}", e)))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| EngineError::Parse("no columns to parse from source".to_string()))?;
    let columns = unique_headers(
        header
            .iter()
            .map(|cell| cell_value(cell).key_string().unwrap_or_default()),
    );
    let width = columns.len();

    let body = rows
        .map(|cells| {
            let mut row: Vec<Value> = cells.iter().map(cell_value).collect();
            row.resize(width, Value::Null);
            row
        })
        .collect();

    Table::new(columns, body)
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::Int(*i),
        // Workbooks store every number as a float; whole numbers read back as integers.
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < MAX_EXACT_INT => {
            Value::Int(*f as i64)
        }
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::DateTime(dt) => dt.as_datetime().map(Value::Timestamp).unwrap_or(Value::Null),
        Data::DateTimeIso(s) => parse_timestamp(s)
            .map(Value::Timestamp)
            .unwrap_or_else(|| Value::Text(s.clone())),
        Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(_) | Data::Empty => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_values() {
        assert_eq!(cell_value(&Data::Float(10.0)), Value::Int(10));
        assert_eq!(cell_value(&Data::Float(2.5)), Value::Float(2.5));
        assert_eq!(cell_value(&Data::String("N".into())), Value::Text("N".into()));
        assert_eq!(cell_value(&Data::String("  ".into())), Value::Null);
        assert_eq!(cell_value(&Data::Empty), Value::Null);
        assert!(matches!(
            cell_value(&Data::DateTimeIso("2024-01-05T10:00:00".into())),
            Value::Timestamp(_)
        ));
    }

    #[test]
    fn test_garbage_bytes_are_parse_error() {
        let err = parse_workbook(b"definitely not a workbook".to_vec()).unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
    }
}
