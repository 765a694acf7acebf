//! Query Pipeline - the fixed stage order over a private table copy

use crate::query::params::QueryParams;
use crate::query::stage::{Stage, StageOutcome, StageReport};
use crate::query::{aggregate, date_filter, filter, gap_fill, sort};
use crate::table::Table;
use tracing::debug;

/// Upper bound on the number of periods a gap-fill may generate.
pub const DEFAULT_MAX_FILL_PERIODS: usize = 100_000;

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: Table,
    pub reports: Vec<StageReport>,
}

#[derive(Debug, Clone)]
pub struct QueryPipeline {
    max_fill_periods: usize,
}

impl Default for QueryPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILL_PERIODS)
    }
}

impl QueryPipeline {
    pub fn new(max_fill_periods: usize) -> Self {
        Self { max_fill_periods }
    }

    /// Date filter, equality filter, aggregation, gap-fill, sort. Stages whose
    /// parameters are absent or name a missing column are skipped; an explicit
    /// empty result stops the run.
    pub fn run(&self, table: Table, params: &QueryParams) -> PipelineOutput {
        let params = params.clone().normalized();
        let mut table = table;
        let mut reports = Vec::with_capacity(5);

        let outcome = date_filter::apply(&mut table, &params);
        if record(&mut reports, Stage::DateFilter, outcome) {
            return PipelineOutput { table, reports };
        }

        let outcome = filter::apply(&mut table, &params);
        record(&mut reports, Stage::EqualityFilter, outcome);

        let (outcome, layout) = aggregate::apply(&mut table, &params);
        record(&mut reports, Stage::Aggregate, outcome);

        let outcome = gap_fill::apply(&mut table, &params, layout, self.max_fill_periods);
        record(&mut reports, Stage::GapFill, outcome);

        let outcome = sort::apply(&mut table, &params);
        record(&mut reports, Stage::Sort, outcome);

        PipelineOutput { table, reports }
    }
}

/// Returns whether the outcome ends the run.
fn record(reports: &mut Vec<StageReport>, stage: Stage, outcome: StageOutcome) -> bool {
    debug!("{}: {}", stage, outcome);
    let stop = outcome.is_short_circuit();
    reports.push(StageReport { stage, outcome });
    stop
}
