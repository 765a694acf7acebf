//! Equality filter on a cell's string form.

use crate::query::params::QueryParams;
use crate::query::stage::{locate_column, StageOutcome};
use crate::table::Table;

/// Keeps rows whose cell renders to exactly `filter_value`. Missing cells
/// never match, not even an empty filter value.
pub fn apply(table: &mut Table, params: &QueryParams) -> StageOutcome {
    let (column, wanted) = match (params.filter_column.as_deref(), params.filter_value.as_deref()) {
        (Some(c), Some(v)) => (c, v),
        _ => return StageOutcome::not_requested(),
    };
    let idx = match locate_column(table, column) {
        Ok(idx) => idx,
        Err(skipped) => return skipped,
    };

    let rows_in = table.height();
    table.retain_rows(|row| row[idx].key_string().as_deref() == Some(wanted));

    StageOutcome::Applied {
        rows_in,
        rows_out: table.height(),
    }
}
