//! Query Module - ad-hoc analytical queries over a table snapshot
//!
//! Stages run in a fixed order: date range filter, equality filter,
//! aggregation, gap-fill, sort. Each stage owns its coercion and reports a
//! `StageOutcome`; none of them fail the request.

pub mod aggregate;
pub mod date_filter;
pub mod filter;
pub mod gap_fill;
pub mod params;
pub mod pipeline;
pub mod sort;
pub mod stage;

pub use aggregate::AggregateLayout;
pub use params::QueryParams;
pub use pipeline::{PipelineOutput, QueryPipeline, DEFAULT_MAX_FILL_PERIODS};
pub use stage::{SkipReason, Stage, StageOutcome, StageReport};
