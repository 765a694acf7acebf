//! Grouped summation over one or two measures.

use crate::query::params::QueryParams;
use crate::query::stage::{locate_column, StageOutcome};
use crate::table::value::OrdValue;
use crate::table::{Number, Table, Value};
use crate::time::TimeBucket;
use std::collections::BTreeMap;

/// Column layout of an aggregated table: `x, [breakdown], y, [y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateLayout {
    pub breakdown: bool,
    pub measures: usize,
}

impl AggregateLayout {
    /// Index of the first measure column.
    pub fn first_measure(&self) -> usize {
        if self.breakdown {
            2
        } else {
            1
        }
    }
}

/// Running sum of one measure within one group.
#[derive(Debug, Clone, Copy, Default)]
struct Sum {
    int: i128,
    float: f64,
}

impl Sum {
    fn add(&mut self, n: Number) {
        match n {
            Number::Int(i) => self.int += i128::from(i),
            Number::Float(f) => self.float += f,
        }
    }

    fn finish(&self, integral: bool) -> Value {
        if integral {
            if let Ok(i) = i64::try_from(self.int) {
                return Value::Int(i);
            }
        }
        Value::Float(self.int as f64 + self.float)
    }
}

type GroupKey = (OrdValue, Option<OrdValue>);

/// Groups by x (bucketed for `week`/`month`) and the optional breakdown, and
/// sums the measures. Rows with a missing key are dropped; non-numeric measure
/// cells count as missing. Sums stay integers when every contributing cell of
/// that measure was an integer.
pub fn apply(table: &mut Table, params: &QueryParams) -> (StageOutcome, Option<AggregateLayout>) {
    let (x, y) = match (params.x_column.as_deref(), params.y_column.as_deref()) {
        (Some(x), Some(y)) => (x, y),
        _ => return (StageOutcome::not_requested(), None),
    };
    let x_idx = match locate_column(table, x) {
        Ok(idx) => idx,
        Err(skipped) => return (skipped, None),
    };
    let y_idx = match locate_column(table, y) {
        Ok(idx) => idx,
        Err(skipped) => return (skipped, None),
    };
    let y2_idx = params.y_column_2.as_deref().and_then(|c| table.column_index(c));
    let breakdown_idx = params.breakdown_column.as_deref().and_then(|c| table.column_index(c));

    let measure_idx: Vec<usize> = std::iter::once(y_idx).chain(y2_idx).collect();
    let bucket = params.group_by.filter(|b| *b != TimeBucket::Day);

    let mut columns = vec![table.columns()[x_idx].clone()];
    if let Some(b) = breakdown_idx {
        columns.push(table.columns()[b].clone());
    }
    columns.extend(measure_idx.iter().map(|&m| table.columns()[m].clone()));

    let mut integral = vec![true; measure_idx.len()];
    let mut groups: BTreeMap<GroupKey, Vec<Sum>> = BTreeMap::new();

    for row in table.rows() {
        let Some(x_key) = group_key(&row[x_idx], bucket) else {
            continue;
        };
        let breakdown_key = match breakdown_idx {
            Some(b) if row[b].is_missing() => continue,
            Some(b) => Some(OrdValue(row[b].clone())),
            None => None,
        };

        let sums = groups
            .entry((OrdValue(x_key), breakdown_key))
            .or_insert_with(|| vec![Sum::default(); measure_idx.len()]);
        for (slot, &m) in measure_idx.iter().enumerate() {
            if let Some(n) = row[m].to_number() {
                if matches!(n, Number::Float(_)) {
                    integral[slot] = false;
                }
                sums[slot].add(n);
            }
        }
    }

    let rows: Vec<Vec<Value>> = groups
        .into_iter()
        .map(|((x_key, breakdown_key), sums)| {
            let mut out = vec![x_key.0];
            out.extend(breakdown_key.map(|b| b.0));
            out.extend(sums.iter().zip(&integral).map(|(s, &i)| s.finish(i)));
            out
        })
        .collect();

    let rows_in = table.height();
    match Table::new(columns, rows) {
        Ok(aggregated) => {
            *table = aggregated;
            let layout = AggregateLayout {
                breakdown: breakdown_idx.is_some(),
                measures: measure_idx.len(),
            };
            (
                StageOutcome::Applied {
                    rows_in,
                    rows_out: table.height(),
                },
                Some(layout),
            )
        }
        Err(e) => (
            StageOutcome::Degraded {
                reason: e.to_string(),
            },
            None,
        ),
    }
}

/// Grouping key for an x cell; `None` drops the row.
fn group_key(cell: &Value, bucket: Option<TimeBucket>) -> Option<Value> {
    match bucket {
        Some(bucket) => cell
            .to_timestamp()
            .and_then(|ts| bucket.floor(ts))
            .map(Value::Timestamp),
        None if cell.is_missing() => None,
        None => Some(cell.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn ts(s: &str) -> Value {
        Value::Timestamp(parse_timestamp(s).unwrap())
    }

    fn sales() -> Table {
        Table::new(
            vec!["Date".into(), "Region".into(), "Units".into(), "Revenue".into()],
            vec![
                vec![text("2024-01-02"), text("N"), Value::Int(5), Value::Float(1.5)],
                vec![text("2024-01-01"), text("N"), Value::Int(10), Value::Float(2.0)],
                vec![text("2024-01-02"), text("S"), text("7"), text("n/a")],
                vec![text("2024-01-02"), text("N"), text("oops"), Value::Int(1)],
                vec![Value::Null, text("N"), Value::Int(100), Value::Int(1)],
                vec![text("2024-01-03"), Value::Null, Value::Int(100), Value::Int(1)],
            ],
        )
        .unwrap()
    }

    fn params() -> QueryParams {
        QueryParams {
            x_column: Some("Date".into()),
            y_column: Some("Units".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_sum_by_x_sorted() {
        let mut table = sales();
        let (outcome, layout) = apply(&mut table, &params());
        assert_eq!(outcome, StageOutcome::Applied { rows_in: 6, rows_out: 3 });
        assert_eq!(layout, Some(AggregateLayout { breakdown: false, measures: 1 }));
        assert_eq!(table.columns(), &["Date", "Units"]);
        assert_eq!(
            table.rows(),
            &[
                vec![text("2024-01-01"), Value::Int(10)],
                vec![text("2024-01-02"), Value::Int(12)],
                vec![text("2024-01-03"), Value::Int(100)],
            ]
        );
    }

    #[test]
    fn test_breakdown_and_second_measure() {
        let mut table = sales();
        let mut p = params();
        p.breakdown_column = Some("Region".into());
        p.y_column_2 = Some("Revenue".into());
        let (_, layout) = apply(&mut table, &p);

        assert_eq!(layout, Some(AggregateLayout { breakdown: true, measures: 2 }));
        assert_eq!(table.columns(), &["Date", "Region", "Units", "Revenue"]);
        // The null-region row is dropped; the null-date row too.
        assert_eq!(
            table.rows(),
            &[
                vec![text("2024-01-01"), text("N"), Value::Int(10), Value::Float(2.0)],
                vec![text("2024-01-02"), text("N"), Value::Int(5), Value::Float(2.5)],
                vec![text("2024-01-02"), text("S"), Value::Int(7), Value::Float(0.0)],
            ]
        );
    }

    #[test]
    fn test_week_buckets_start_monday() {
        let mut table = Table::new(
            vec!["Date".into(), "Units".into()],
            vec![
                vec![text("2024-01-03"), Value::Int(1)], // Wednesday
                vec![text("2024-01-07"), Value::Int(2)], // Sunday
                vec![text("2024-01-08"), Value::Int(4)], // Monday
                vec![text("garbage"), Value::Int(8)],
            ],
        )
        .unwrap();
        let mut p = params();
        p.group_by = Some(TimeBucket::Week);
        apply(&mut table, &p);
        assert_eq!(
            table.rows(),
            &[
                vec![ts("2024-01-01"), Value::Int(3)],
                vec![ts("2024-01-08"), Value::Int(4)],
            ]
        );
    }

    #[test]
    fn test_month_buckets() {
        let mut table = Table::new(
            vec!["Date".into(), "Units".into()],
            vec![
                vec![text("2024-01-31 18:00"), Value::Float(0.5)],
                vec![text("2024-02-01"), Value::Int(1)],
                vec![text("2024-01-02"), Value::Int(2)],
            ],
        )
        .unwrap();
        let mut p = params();
        p.group_by = Some(TimeBucket::Month);
        apply(&mut table, &p);
        assert_eq!(
            table.rows(),
            &[
                vec![ts("2024-01-01"), Value::Float(2.5)],
                vec![ts("2024-02-01"), Value::Float(1.0)],
            ]
        );
    }

    #[test]
    fn test_all_missing_group_sums_to_zero() {
        let mut table = Table::new(
            vec!["k".into(), "v".into()],
            vec![vec![text("a"), text("x")], vec![text("b"), Value::Int(2)]],
        )
        .unwrap();
        let p = QueryParams {
            x_column: Some("k".into()),
            y_column: Some("v".into()),
            ..Default::default()
        };
        apply(&mut table, &p);
        assert_eq!(table.rows()[0], vec![text("a"), Value::Int(0)]);
    }

    #[test]
    fn test_missing_y_column_skips() {
        let mut table = sales();
        let mut p = params();
        p.y_column = Some("Profit".into());
        let (outcome, layout) = apply(&mut table, &p);
        assert!(matches!(outcome, StageOutcome::Skipped { .. }));
        assert!(layout.is_none());
        assert_eq!(table, sales());
    }

    #[test]
    fn test_colliding_columns_degrade() {
        let mut table = sales();
        let mut p = params();
        p.y_column = Some("Date".into());
        let (outcome, layout) = apply(&mut table, &p);
        assert!(matches!(outcome, StageOutcome::Degraded { .. }));
        assert!(layout.is_none());
        assert_eq!(table, sales());
    }
}
