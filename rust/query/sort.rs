//! Stable ascending sort by a column's inferred kind.

use crate::query::params::QueryParams;
use crate::query::stage::{locate_column, StageOutcome};
use crate::table::value::parse_number;
use crate::table::{ColumnKind, Table, Value};
use crate::time::parse_timestamp;
use chrono::NaiveDateTime;
use std::cmp::Ordering;

/// Comparable projection of a cell under a column kind.
#[derive(Debug, Clone, PartialEq)]
enum SortKey<'a> {
    Bool(bool),
    Number(f64),
    Time(NaiveDateTime),
    Text(&'a str),
}

impl SortKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Time(a), SortKey::Time(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// `None` when the cell does not fit the column kind; such cells sort last.
fn sort_key(kind: ColumnKind, cell: &Value) -> Option<SortKey<'_>> {
    match (kind, cell) {
        (ColumnKind::Boolean, Value::Bool(b)) => Some(SortKey::Bool(*b)),
        (ColumnKind::Integer | ColumnKind::Float, Value::Int(i)) => Some(SortKey::Number(*i as f64)),
        (ColumnKind::Integer | ColumnKind::Float, Value::Float(f)) if f.is_finite() => {
            Some(SortKey::Number(*f))
        }
        (ColumnKind::Integer | ColumnKind::Float, Value::Text(s)) => {
            parse_number(s).map(|n| SortKey::Number(n.as_f64()))
        }
        (ColumnKind::Timestamp, Value::Timestamp(ts)) => Some(SortKey::Time(*ts)),
        (ColumnKind::Timestamp, Value::Text(s)) => parse_timestamp(s).map(SortKey::Time),
        (ColumnKind::Text, Value::Text(s)) => Some(SortKey::Text(s)),
        _ => None,
    }
}

fn compare(a: Option<&SortKey<'_>>, b: Option<&SortKey<'_>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn apply(table: &mut Table, params: &QueryParams) -> StageOutcome {
    let Some(column) = params.sort_by.as_deref() else {
        return StageOutcome::not_requested();
    };
    let idx = match locate_column(table, column) {
        Ok(idx) => idx,
        Err(skipped) => return skipped,
    };

    let kind = table.column_kind(idx);
    let rows = table.height();
    table.sort_rows_by(|a, b| {
        compare(sort_key(kind, &a[idx]).as_ref(), sort_key(kind, &b[idx]).as_ref())
    });

    StageOutcome::Applied {
        rows_in: rows,
        rows_out: rows,
    }
}
