//! Cell values and the per-stage coercions applied to them.

use crate::time::parse_timestamp;
use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// A single table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

/// A cell coerced to a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

/// Shape of a cell, used for column kind inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Boolean,
    Integer,
    Float,
    Timestamp,
    Text,
}

impl Value {
    /// Null, or a float that is NaN or infinite.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => !f.is_finite(),
            _ => false,
        }
    }

    pub fn kind(&self) -> Option<CellKind> {
        if self.is_missing() {
            return None;
        }
        Some(match self {
            Value::Bool(_) => CellKind::Boolean,
            Value::Int(_) => CellKind::Integer,
            Value::Float(_) => CellKind::Float,
            Value::Timestamp(_) => CellKind::Timestamp,
            Value::Text(_) | Value::Null => CellKind::Text,
        })
    }

    /// Timestamp coercion: timestamps pass through, everything else is
    /// rendered to text and parsed. `None` means "treat as missing".
    pub fn to_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Text(s) => parse_timestamp(s),
            other => other.key_string().as_deref().and_then(parse_timestamp),
        }
    }

    /// Numeric coercion. Booleans count as 1/0, text is trimmed and parsed,
    /// timestamps and non-finite floats are missing.
    pub fn to_number(&self) -> Option<Number> {
        match self {
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) if f.is_finite() => Some(Number::Float(*f)),
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Text(s) => parse_number(s),
            _ => None,
        }
    }

    /// String form used for equality matching. Mirrors the projected JSON
    /// rendering; missing values have no string form.
    pub fn key_string(&self) -> Option<String> {
        if self.is_missing() {
            return None;
        }
        match self {
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Timestamp(ts) => Some(format_timestamp(ts)),
            Value::Null => None,
        }
    }

    /// JSON rendering with a single null marker for every missing value.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Timestamp(ts) => JsonValue::String(format_timestamp(ts)),
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

pub fn parse_number(raw: &str) -> Option<Number> {
    let s = raw.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::Int(i));
    }
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Number::Float)
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

fn class_rank(v: &Value) -> u8 {
    match v {
        Value::Bool(_) => 0,
        Value::Int(_) | Value::Float(_) => 1,
        Value::Timestamp(_) => 2,
        Value::Text(_) => 3,
        Value::Null => 4,
    }
}

/// Total order over values: booleans, then numbers (compared numerically),
/// timestamps, text, and missing last.
pub fn natural_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Int(x), Value::Float(y)) => (*x as f64).total_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.total_cmp(&(*y as f64)),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        _ => class_rank(a).cmp(&class_rank(b)),
    }
}

/// A value usable as an ordered map key (grouping keys, pivot columns).
#[derive(Debug, Clone)]
pub(crate) struct OrdValue(pub Value);

impl PartialEq for OrdValue {
    fn eq(&self, other: &Self) -> bool {
        natural_cmp(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for OrdValue {}

impl PartialOrd for OrdValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrdValue {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::Text(" 42 ".into()).to_number(), Some(Number::Int(42)));
        assert_eq!(Value::Text("2.5".into()).to_number(), Some(Number::Float(2.5)));
        assert_eq!(Value::Text("abc".into()).to_number(), None);
        assert_eq!(Value::Text("NaN".into()).to_number(), None);
        assert_eq!(Value::Bool(true).to_number(), Some(Number::Int(1)));
        assert_eq!(Value::Float(f64::NAN).to_number(), None);
        assert_eq!(Value::Null.to_number(), None);
    }

    #[test]
    fn test_timestamp_coercion() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(Value::Text(" 2024-01-05 ".into()).to_timestamp(), Some(expected));
        assert_eq!(Value::Int(20240105).to_timestamp(), Some(expected));
        assert_eq!(Value::Timestamp(expected).to_timestamp(), Some(expected));
        assert_eq!(Value::Text("soon".into()).to_timestamp(), None);
        assert_eq!(Value::Null.to_timestamp(), None);
    }

    #[test]
    fn test_key_string_matches_json_rendering() {
        assert_eq!(Value::Float(10.0).key_string().as_deref(), Some("10"));
        assert_eq!(Value::Float(2.5).key_string().as_deref(), Some("2.5"));
        assert_eq!(Value::Bool(false).key_string().as_deref(), Some("false"));
        let ts = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(8, 30, 0).unwrap();
        assert_eq!(Value::Timestamp(ts).key_string().as_deref(), Some("2024-01-05T08:30:00"));
        assert_eq!(Value::Null.key_string(), None);
    }

    #[test]
    fn test_json_nulls() {
        assert_eq!(Value::Float(f64::NAN).to_json(), JsonValue::Null);
        assert_eq!(Value::Float(f64::INFINITY).to_json(), JsonValue::Null);
        assert_eq!(Value::Null.to_json(), JsonValue::Null);
        assert_eq!(Value::Int(3).to_json(), JsonValue::from(3));
    }

    #[test]
    fn test_natural_order() {
        assert_eq!(natural_cmp(&Value::Int(2), &Value::Float(2.5)), Ordering::Less);
        assert_eq!(natural_cmp(&Value::Int(3), &Value::Float(3.0)), Ordering::Equal);
        assert_eq!(natural_cmp(&Value::Text("b".into()), &Value::Null), Ordering::Less);
        assert_eq!(natural_cmp(&Value::Int(99), &Value::Text("a".into())), Ordering::Less);
    }
}
