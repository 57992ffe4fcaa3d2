//! Literal values compared against catalog columns.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Timestamp(NaiveDateTime),
}

impl FieldValue {
    /// First instant of a calendar day.
    pub fn start_of_day(date: NaiveDate) -> Self {
        FieldValue::Timestamp(date.and_time(NaiveTime::default()))
    }

    /// Last microsecond of a calendar day.
    pub fn end_of_day(date: NaiveDate) -> Self {
        let end = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or_default();
        FieldValue::Timestamp(date.and_time(end))
    }

    /// Render as a SQL literal.
    ///
    /// Text is double quoted, numbers keep a decimal point, timestamps are
    /// quoted ISO-8601 with microseconds only when non-zero.
    pub fn to_sql(&self) -> String {
        match self {
            FieldValue::Text(s) => quote(s),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Number(n) => format!("{:?}", n),
            FieldValue::Timestamp(ts) => quote(&iso_timestamp(ts)),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Number(n) => write!(f, "{:?}", n),
            FieldValue::Timestamp(ts) => f.write_str(&iso_timestamp(ts)),
        }
    }
}

pub(crate) fn iso_timestamp(ts: &NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Integer(i as i64)
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Integer(i as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(ts: NaiveDateTime) -> Self {
        FieldValue::Timestamp(ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_literals() {
        assert_eq!(FieldValue::from("PRE").to_sql(), "\"PRE\"");
        assert_eq!(FieldValue::from(64.0).to_sql(), "64.0");
        assert_eq!(FieldValue::from(33).to_sql(), "33");
        assert_eq!(FieldValue::from("a\"b").to_sql(), "\"a\\\"b\"");
    }

    #[test]
    fn test_day_bounds() {
        let day = NaiveDate::from_ymd_opt(2017, 3, 12).unwrap();
        assert_eq!(
            FieldValue::start_of_day(day).to_sql(),
            "\"2017-03-12T00:00:00\""
        );
        assert_eq!(
            FieldValue::end_of_day(day).to_sql(),
            "\"2017-03-12T23:59:59.999999\""
        );
    }
}
