//! Per-stage outcome reporting

use crate::table::Table;
use serde::Serialize;
use std::fmt;
use strsim::jaro_winkler;

/// Minimum similarity for a column to be offered as a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    DateFilter,
    EqualityFilter,
    Aggregate,
    GapFill,
    Sort,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::DateFilter => "date_filter",
            Stage::EqualityFilter => "equality_filter",
            Stage::Aggregate => "aggregate",
            Stage::GapFill => "gap_fill",
            Stage::Sort => "sort",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    NotRequested,
    MissingColumn {
        column: String,
        closest: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    Applied { rows_in: usize, rows_out: usize },
    Skipped { reason: SkipReason },
    /// The stage produced an explicit empty result; later stages do not run.
    Empty { reason: String },
    /// The stage hit a recoverable problem and passed its input through.
    Degraded { reason: String },
}

impl StageOutcome {
    pub fn not_requested() -> Self {
        StageOutcome::Skipped {
            reason: SkipReason::NotRequested,
        }
    }

    pub fn is_short_circuit(&self) -> bool {
        matches!(self, StageOutcome::Empty { .. })
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Applied { rows_in, rows_out } => {
                write!(f, "applied ({} -> {} rows)", rows_in, rows_out)
            }
            StageOutcome::Skipped {
                reason: SkipReason::NotRequested,
            } => f.write_str("skipped"),
            StageOutcome::Skipped {
                reason: SkipReason::MissingColumn { column, closest },
            } => match closest {
                Some(c) => write!(f, "skipped (no column '{}', did you mean '{}'?)", column, c),
                None => write!(f, "skipped (no column '{}')", column),
            },
            StageOutcome::Empty { reason } => write!(f, "empty ({})", reason),
            StageOutcome::Degraded { reason } => write!(f, "degraded ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    #[serde(flatten)]
    pub outcome: StageOutcome,
}

/// Index of `name` in `table`, or the skip outcome naming the closest column.
pub(crate) fn locate_column(table: &Table, name: &str) -> std::result::Result<usize, StageOutcome> {
    table.column_index(name).ok_or_else(|| StageOutcome::Skipped {
        reason: SkipReason::MissingColumn {
            column: name.to_string(),
            closest: closest_column(table, name),
        },
    })
}

fn closest_column(table: &Table, name: &str) -> Option<String> {
    let wanted = name.to_lowercase();
    table
        .columns()
        .iter()
        .map(|c| (jaro_winkler(&wanted, &c.to_lowercase()), c))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.clone())
}
