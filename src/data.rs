use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single decoded cell. Absent cells are represented as `None` in a row
/// (`Vec<Option<Value>>`) rather than as a variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_local());
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Lower-cases a header and replaces spaces with underscores.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn non_blank(value: &Value) -> Option<&Value> {
    match value {
        Value::String(s) if s.trim().is_empty() => None,
        other => Some(other),
    }
}

pub fn coerce_text(value: Option<&Value>) -> Option<String> {
    let value = non_blank(value?)?;
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.as_display()),
    }
}

pub fn coerce_float(value: Option<&Value>) -> Option<f64> {
    let parsed = match non_blank(value?)? {
        Value::Integer(i) => *i as f64,
        Value::Float(f) => *f,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Boolean(_) | Value::Date(_) | Value::DateTime(_) => return None,
    };
    parsed.is_finite().then_some(parsed)
}

/// Accepts integers and integral floats (`2020.0`); anything else is `None`.
pub fn coerce_integer(value: Option<&Value>) -> Option<i64> {
    match non_blank(value?)? {
        Value::Integer(i) => Some(*i),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| integral(trimmed.parse::<f64>().ok()?))
        }
        Value::Float(f) => integral(*f),
        Value::Boolean(_) | Value::Date(_) | Value::DateTime(_) => None,
    }
}

fn integral(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() <= i64::MAX as f64)
        .then_some(value as i64)
}

pub fn coerce_date(value: Option<&Value>) -> Option<NaiveDate> {
    match non_blank(value?)? {
        Value::Date(d) => Some(*d),
        Value::DateTime(dt) => Some(dt.date()),
        Value::String(s) => {
            let trimmed = s.trim();
            parse_naive_date(trimmed)
                .or_else(|_| parse_naive_datetime(trimmed).map(|dt| dt.date()))
                .ok()
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) => None,
    }
}
