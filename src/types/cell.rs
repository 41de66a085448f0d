use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Seconds in one serial day.
const SECONDS_PER_DAY: f64 = 86_400.0;

/// A single cell value.
///
/// Dates are stored as serial days since 1899-12-30 (the spreadsheet epoch),
/// with the fractional part carrying the time of day.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum CellValue {
    #[default]
    Null,
    Number(f64),
    Text(String),
    Boolean(bool),
    Date(f64),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view used by sum/average/min/max. Dates fold by serial.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) | CellValue::Date(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Short lowercase name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Null => "null",
            CellValue::Number(_) => "number",
            CellValue::Text(_) => "text",
            CellValue::Boolean(_) => "boolean",
            CellValue::Date(_) => "date",
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Boolean(true) => f.write_str("TRUE"),
            CellValue::Boolean(false) => f.write_str("FALSE"),
            CellValue::Date(serial) => match serial_to_datetime(*serial) {
                Some(dt) if dt.time() == chrono::NaiveTime::MIN => {
                    write!(f, "{}", dt.format("%Y-%m-%d"))
                }
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
                None => write!(f, "{serial}"),
            },
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(f64::from(n))
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Null, Into::into)
    }
}

/// Declared type of a column. Fixed at creation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Text,
    Boolean,
    Date,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
        })
    }
}

impl ColumnType {
    /// Coerce `value` into this column type.
    ///
    /// Returns `None` when the value cannot be represented. Blank text becomes
    /// `Null` for every type.
    /// - Numeric: numbers, numeric strings
    /// - Text: any scalar, stored as its display string
    /// - Boolean: booleans, "true"/"false" (case-insensitive)
    /// - Date: dates, serial numbers, numeric strings, ISO date/datetime strings
    pub fn coerce(self, value: CellValue) -> Option<CellValue> {
        if let CellValue::Text(s) = &value {
            if s.trim().is_empty() {
                return Some(CellValue::Null);
            }
        }

        match (self, value) {
            (_, CellValue::Null) => Some(CellValue::Null),

            (ColumnType::Numeric, CellValue::Number(n)) => Some(CellValue::Number(n)),
            (ColumnType::Numeric, CellValue::Text(s)) => {
                s.trim().parse::<f64>().ok().map(CellValue::Number)
            }
            (ColumnType::Numeric, _) => None,

            (ColumnType::Text, CellValue::Text(s)) => Some(CellValue::Text(s)),
            (ColumnType::Text, other) => Some(CellValue::Text(other.to_string())),

            (ColumnType::Boolean, CellValue::Boolean(b)) => Some(CellValue::Boolean(b)),
            (ColumnType::Boolean, CellValue::Text(s)) => {
                let trimmed = s.trim();
                if trimmed.eq_ignore_ascii_case("true") {
                    Some(CellValue::Boolean(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Some(CellValue::Boolean(false))
                } else {
                    None
                }
            }
            (ColumnType::Boolean, _) => None,

            (ColumnType::Date, CellValue::Date(d)) => Some(CellValue::Date(d)),
            (ColumnType::Date, CellValue::Number(n)) if n.is_finite() => Some(CellValue::Date(n)),
            (ColumnType::Date, CellValue::Text(s)) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .or_else(|| parse_iso_date(trimmed))
                    .map(CellValue::Date)
            }
            (ColumnType::Date, _) => None,
        }
    }
}

fn epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// Convert a calendar datetime to a serial day number.
#[allow(clippy::cast_precision_loss)]
pub fn datetime_to_serial(dt: NaiveDateTime) -> Option<f64> {
    let seconds = dt.signed_duration_since(epoch()?).num_seconds();
    Some(seconds as f64 / SECONDS_PER_DAY)
}

/// Convert a serial day number back to a calendar datetime (second precision).
#[allow(clippy::cast_possible_truncation)]
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let seconds = (serial * SECONDS_PER_DAY).round();
    if seconds.abs() > 1e15 {
        return None;
    }
    epoch()?.checked_add_signed(TimeDelta::try_seconds(seconds as i64)?)
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD HH:MM:SS`.
pub fn parse_iso_date(text: &str) -> Option<f64> {
    let dt = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    datetime_to_serial(dt)
}
