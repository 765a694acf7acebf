//! Columnar hand-off for analysis consumers (the chat feature runs generated
//! code against a polars frame rather than our row storage).

use super::{ColumnKind, Table, Value};
use crate::error::Result;
use polars::prelude::*;

impl Table {
    /// Convert to a polars `DataFrame`, typing each column by its inferred
    /// kind. Cells that do not fit the column kind become null.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut series = Vec::with_capacity(self.width());

        for (idx, name) in self.columns().iter().enumerate() {
            let name = name.as_str();
            let s = match self.column_kind(idx) {
                ColumnKind::Integer => {
                    let values: Vec<Option<i64>> = self
                        .column(idx)
                        .map(|v| match v {
                            Value::Int(i) => Some(*i),
                            _ => None,
                        })
                        .collect();
                    Series::new(name, values)
                }
                ColumnKind::Float => {
                    let values: Vec<Option<f64>> = self
                        .column(idx)
                        .map(|v| match v {
                            Value::Int(_) | Value::Float(_) => v.to_number().map(|n| n.as_f64()),
                            _ => None,
                        })
                        .collect();
                    Series::new(name, values)
                }
                ColumnKind::Boolean => {
                    let values: Vec<Option<bool>> = self
                        .column(idx)
                        .map(|v| match v {
                            Value::Bool(b) => Some(*b),
                            _ => None,
                        })
                        .collect();
                    Series::new(name, values)
                }
                ColumnKind::Timestamp => {
                    let millis: Vec<Option<i64>> = self
                        .column(idx)
                        .map(|v| match v {
                            Value::Timestamp(ts) => Some(ts.and_utc().timestamp_millis()),
                            _ => None,
                        })
                        .collect();
                    Series::new(name, millis)
                        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
                }
                ColumnKind::Text | ColumnKind::Empty => {
                    let values: Vec<Option<String>> =
                        self.column(idx).map(Value::key_string).collect();
                    Series::new(name, values)
                }
            };
            series.push(s);
        }

        Ok(DataFrame::new(series)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_to_dataframe_types_columns_by_kind() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let table = Table::new(
            vec!["when".into(), "units".into(), "price".into(), "region".into()],
            vec![
                vec![Value::Timestamp(ts), Value::Int(10), Value::Float(2.5), Value::Text("N".into())],
                vec![Value::Null, Value::Text("bad".into()), Value::Int(3), Value::Null],
                vec![Value::Timestamp(ts), Value::Int(7), Value::Float(1.0), Value::Text("S".into())],
            ],
        )
        .unwrap();

        let df = table.to_dataframe().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 4);
        assert_eq!(df.column("units").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("units").unwrap().null_count(), 1);
        assert_eq!(df.column("price").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("region").unwrap().dtype(), &DataType::String);
        assert!(matches!(df.column("when").unwrap().dtype(), DataType::Datetime(_, _)));
    }
}
