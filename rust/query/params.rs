use crate::time::TimeBucket;
use serde::{Deserialize, Serialize};

/// Ad-hoc query parameters. Every field is optional and untrusted; a stage
/// whose parameters are absent or name a missing column is skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub date_column: Option<String>,
    pub filter_column: Option<String>,
    pub filter_value: Option<String>,
    pub x_column: Option<String>,
    pub y_column: Option<String>,
    pub y_column_2: Option<String>,
    pub breakdown_column: Option<String>,
    pub group_by: Option<TimeBucket>,
    pub sort_by: Option<String>,
}

impl QueryParams {
    /// Blank strings count as absent.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.start_date,
            &mut self.end_date,
            &mut self.date_column,
            &mut self.filter_column,
            &mut self.x_column,
            &mut self.y_column,
            &mut self.y_column_2,
            &mut self.breakdown_column,
            &mut self.sort_by,
        ] {
            if field.as_deref().map_or(false, |s| s.trim().is_empty()) {
                *field = None;
            }
        }
        self
    }

    pub fn has_date_bounds(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some()
    }
}
