//! Date range filter: keeps rows whose date falls in `[start, end + 1 day)`.

use crate::query::params::QueryParams;
use crate::query::stage::{locate_column, StageOutcome};
use crate::table::{Table, Value};
use crate::time::{end_of_day_exclusive, parse_timestamp};
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DateBounds {
    start: Option<NaiveDateTime>,
    end_exclusive: Option<NaiveDateTime>,
}

impl DateBounds {
    fn contains(&self, ts: &NaiveDateTime) -> bool {
        self.start.map_or(true, |s| *ts >= s) && self.end_exclusive.map_or(true, |e| *ts < e)
    }
}

fn resolve_bounds(params: &QueryParams) -> std::result::Result<DateBounds, String> {
    let start = match params.start_date.as_deref() {
        Some(raw) => Some(
            parse_timestamp(raw).ok_or_else(|| format!("unparsable start_date '{}'", raw))?,
        ),
        None => None,
    };
    let end_exclusive = match params.end_date.as_deref() {
        Some(raw) => {
            let end = parse_timestamp(raw).ok_or_else(|| format!("unparsable end_date '{}'", raw))?;
            Some(end_of_day_exclusive(end).ok_or_else(|| format!("end_date '{}' out of range", raw))?)
        }
        None => None,
    };
    Ok(DateBounds {
        start,
        end_exclusive,
    })
}

/// Parses the date column to timestamps in place, then drops rows outside
/// the range. Cells that do not parse are treated as missing and excluded.
/// A bound that does not parse empties the table.
pub fn apply(table: &mut Table, params: &QueryParams) -> StageOutcome {
    let column = match params.date_column.as_deref() {
        Some(c) if params.has_date_bounds() => c,
        _ => return StageOutcome::not_requested(),
    };
    let idx = match locate_column(table, column) {
        Ok(idx) => idx,
        Err(skipped) => return skipped,
    };

    table.map_column(idx, |v| v.to_timestamp().map(Value::Timestamp).unwrap_or(Value::Null));

    let bounds = match resolve_bounds(params) {
        Ok(bounds) => bounds,
        Err(reason) => {
            *table = table.empty_like();
            return StageOutcome::Empty { reason };
        }
    };

    let rows_in = table.height();
    table.retain_rows(|row| match &row[idx] {
        Value::Timestamp(ts) => bounds.contains(ts),
        _ => false,
    });

    StageOutcome::Applied {
        rows_in,
        rows_out: table.height(),
    }
}
