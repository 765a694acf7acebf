//! Gap-fill: reindex an aggregated table onto a complete period sequence.

use crate::query::aggregate::AggregateLayout;
use crate::query::params::QueryParams;
use crate::query::stage::StageOutcome;
use crate::table::value::OrdValue;
use crate::table::{Table, Value};
use crate::time::{parse_timestamp, TimeBucket};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};

/// Reindexes onto every bucket between the lower and upper bound, inserting
/// zero rows for missing periods. With a breakdown each breakdown value gets
/// its own complete series, breakdown-major. Any inconsistency leaves the
/// aggregated table untouched and reports `Degraded`.
pub fn apply(
    table: &mut Table,
    params: &QueryParams,
    layout: Option<AggregateLayout>,
    max_periods: usize,
) -> StageOutcome {
    let (bucket, layout) = match (params.group_by, layout) {
        (Some(bucket), Some(layout)) => (bucket, layout),
        _ => return StageOutcome::not_requested(),
    };

    match fill(table, params, bucket, layout, max_periods) {
        Ok(filled) => {
            let rows_in = table.height();
            *table = filled;
            StageOutcome::Applied {
                rows_in,
                rows_out: table.height(),
            }
        }
        Err(reason) => StageOutcome::Degraded { reason },
    }
}

fn fill(
    table: &Table,
    params: &QueryParams,
    bucket: TimeBucket,
    layout: AggregateLayout,
    max_periods: usize,
) -> std::result::Result<Table, String> {
    let first_measure = layout.first_measure();

    let mut keys = Vec::with_capacity(table.height());
    for row in table.rows() {
        let key = row[0]
            .to_timestamp()
            .and_then(|ts| bucket.floor(ts))
            .ok_or_else(|| format!("x value {:?} is not a date", row[0]))?;
        keys.push(key);
    }

    let lower = bound(params.start_date.as_deref(), "start_date")?.or_else(|| keys.iter().min().copied());
    let upper = bound(params.end_date.as_deref(), "end_date")?.or_else(|| keys.iter().max().copied());
    let (lower, upper) = match (lower, upper) {
        (Some(l), Some(u)) => (l, u),
        _ => return Err("no rows to derive a period range from".to_string()),
    };

    let periods = bucket
        .sequence(lower, upper, max_periods)
        .ok_or_else(|| format!("period range exceeds {} {} buckets", max_periods, bucket))?;
    if periods.is_empty() {
        return Err("empty period range".to_string());
    }

    let zeros: Vec<Value> = (first_measure..first_measure + layout.measures)
        .map(|m| zero_like(table, m))
        .collect();

    let mut observed: BTreeMap<(NaiveDateTime, Option<OrdValue>), &[Value]> = BTreeMap::new();
    let mut breakdowns: BTreeSet<OrdValue> = BTreeSet::new();
    for (row, key) in table.rows().iter().zip(&keys) {
        let breakdown = layout.breakdown.then(|| OrdValue(row[1].clone()));
        if let Some(b) = &breakdown {
            breakdowns.insert(b.clone());
        }
        if observed.insert((*key, breakdown), &row[first_measure..]).is_some() {
            return Err(format!("duplicate bucket {}", key));
        }
    }

    let series: Vec<Option<OrdValue>> = if layout.breakdown {
        breakdowns.into_iter().map(Some).collect()
    } else {
        vec![None]
    };

    let mut rows = Vec::with_capacity(series.len() * periods.len());
    for breakdown in series {
        for period in &periods {
            let measures = observed
                .get(&(*period, breakdown.clone()))
                .copied()
                .unwrap_or(zeros.as_slice());
            let mut row = vec![Value::Timestamp(*period)];
            row.extend(breakdown.as_ref().map(|b| b.0.clone()));
            row.extend(measures.iter().cloned());
            rows.push(row);
        }
    }

    Table::new(table.columns().to_vec(), rows).map_err(|e| e.to_string())
}

fn bound(raw: Option<&str>, name: &str) -> std::result::Result<Option<NaiveDateTime>, String> {
    match raw {
        Some(s) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| format!("unparsable {} '{}'", name, s)),
        None => Ok(None),
    }
}

/// Zero of the same numeric kind as the measure column.
fn zero_like(table: &Table, idx: usize) -> Value {
    if table.column(idx).any(|v| matches!(v, Value::Float(_))) {
        Value::Float(0.0)
    } else {
        Value::Int(0)
    }
}
