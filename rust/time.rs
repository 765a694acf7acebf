//! Timestamp parsing and calendar buckets.
//!
//! Parsing is permissive: it accepts the date and date-time shapes that show up
//! in exported spreadsheets and CSV dumps and returns `None` for anything else,
//! so callers can treat an unparsable cell as missing.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Earliest and latest years a timestamp may carry. Values outside this window
/// are treated as unparsable rather than clamped.
const MIN_YEAR: i32 = 1677;
const MAX_YEAR: i32 = 2262;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Parse a timestamp from text. Leading and trailing whitespace is ignored.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return in_range(dt.naive_utc());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return in_range(dt);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return in_range(d.and_hms_opt(0, 0, 0)?);
        }
    }

    // Compact YYYYMMDD
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y%m%d") {
            return in_range(d.and_hms_opt(0, 0, 0)?);
        }
    }

    None
}

fn in_range(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    (MIN_YEAR..=MAX_YEAR).contains(&dt.year()).then_some(dt)
}

/// Exclusive upper bound that makes `end` cover its whole calendar day.
pub fn end_of_day_exclusive(end: NaiveDateTime) -> Option<NaiveDateTime> {
    end.checked_add_signed(Duration::days(1))
}

/// Time granularity used to group rows before summation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    Day,
    Week,
    Month,
}

impl TimeBucket {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Some(TimeBucket::Day),
            "week" => Some(TimeBucket::Week),
            "month" => Some(TimeBucket::Month),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeBucket::Day => "day",
            TimeBucket::Week => "week",
            TimeBucket::Month => "month",
        }
    }

    /// Start of the bucket containing `ts`: midnight, the preceding Monday at
    /// midnight, or the first of the month at midnight.
    pub fn floor(&self, ts: NaiveDateTime) -> Option<NaiveDateTime> {
        let date = ts.date();
        let start = match self {
            TimeBucket::Day => date,
            TimeBucket::Week => {
                let back = date.weekday().num_days_from_monday() as i64;
                date.checked_sub_signed(Duration::days(back))?
            }
            TimeBucket::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?,
        };
        start.and_hms_opt(0, 0, 0)
    }

    /// Start of the bucket following the one that starts at `start`.
    pub fn next(&self, start: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            TimeBucket::Day => start.checked_add_signed(Duration::days(1)),
            TimeBucket::Week => start.checked_add_signed(Duration::days(7)),
            TimeBucket::Month => start.checked_add_months(Months::new(1)),
        }
    }

    /// Every bucket start from `floor(lower)` through `floor(upper)` inclusive.
    ///
    /// Returns `None` when a bound cannot be floored or the sequence would be
    /// longer than `limit`; returns an empty vector when `lower > upper`.
    pub fn sequence(
        &self,
        lower: NaiveDateTime,
        upper: NaiveDateTime,
        limit: usize,
    ) -> Option<Vec<NaiveDateTime>> {
        let first = self.floor(lower)?;
        let last = self.floor(upper)?;

        let mut out = Vec::new();
        let mut current = first;
        while current <= last {
            if out.len() >= limit {
                return None;
            }
            out.push(current);
            current = self.next(current)?;
        }
        Some(out)
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
