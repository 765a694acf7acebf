//! Result Projector - tables to `{columns, rows}` JSON records

use crate::table::Table;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub type Record = Map<String, JsonValue>;

/// Query response: column order of the table, row order of the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// First rows of a source plus its full row count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
    pub total_rows: usize,
}

/// Every missing or non-finite value becomes `null`; timestamps render as
/// ISO strings.
pub fn project(table: &Table) -> QueryResult {
    let columns = table.columns().to_vec();
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            columns
                .iter()
                .zip(row)
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect::<Record>()
        })
        .collect();
    QueryResult { columns, rows }
}

pub fn preview(table: &Table, limit: usize) -> TablePreview {
    let QueryResult { columns, rows } = project(&table.head(limit));
    TablePreview {
        columns,
        rows,
        total_rows: table.height(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;
    use crate::time::parse_timestamp;
    use serde_json::json;

    fn table() -> Table {
        Table::new(
            vec!["z".into(), "a".into(), "when".into()],
            vec![
                vec![Value::Float(f64::NAN), Value::Text("x".into()), Value::Null],
                vec![
                    Value::Int(1),
                    Value::Bool(true),
                    Value::Timestamp(parse_timestamp("2024-01-02").unwrap()),
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_project_nulls_and_order() {
        let result = project(&table());
        assert_eq!(result.columns, vec!["z", "a", "when"]);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "columns": ["z", "a", "when"],
                "rows": [
                    {"z": null, "a": "x", "when": null},
                    {"z": 1, "a": true, "when": "2024-01-02T00:00:00"}
                ]
            })
        );
        let keys: Vec<&String> = result.rows[0].keys().collect();
        assert_eq!(keys, vec!["z", "a", "when"]);
    }

    #[test]
    fn test_preview_counts_all_rows() {
        let preview = preview(&table(), 1);
        assert_eq!(preview.rows.len(), 1);
        assert_eq!(preview.total_rows, 2);
    }
}
