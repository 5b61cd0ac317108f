// ABOUTME: Closed tagged-variant value type produced once when rows are read
// ABOUTME: Every driver maps its native cells into SqlValue before conversion

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;
use std::borrow::Cow;

/// A single cell read from the source database
///
/// Drivers produce these at read time so the converter can match
/// exhaustively instead of inspecting driver types.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    /// Timestamp normalized to UTC
    Timestamp(NaiveDateTime),
    Json(JsonValue),
    Array(Vec<SqlValue>),
}

pub type Row = Vec<SqlValue>;

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Textual form used when a value has to be written as a plain string
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            SqlValue::Null => Cow::Borrowed(""),
            SqlValue::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            SqlValue::Int(i) => Cow::Owned(i.to_string()),
            SqlValue::Float(f) => Cow::Owned(f.to_string()),
            SqlValue::Text(s) => Cow::Borrowed(s.as_str()),
            SqlValue::Bytes(b) => String::from_utf8_lossy(b),
            SqlValue::Date(d) => Cow::Owned(d.format("%Y-%m-%d").to_string()),
            SqlValue::Timestamp(ts) => Cow::Owned(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            SqlValue::Json(j) => Cow::Owned(j.to_string()),
            SqlValue::Array(_) => Cow::Owned(self.to_json().to_string()),
        }
    }

    /// JSON representation, used for JSON columns and for arrays on
    /// targets without native array types
    pub fn to_json(&self) -> JsonValue {
        match self {
            SqlValue::Null => JsonValue::Null,
            SqlValue::Bool(b) => JsonValue::Bool(*b),
            SqlValue::Int(i) => JsonValue::Number((*i).into()),
            SqlValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(f.to_string())),
            SqlValue::Text(s) => JsonValue::String(s.clone()),
            SqlValue::Bytes(b) => JsonValue::String(hex::encode(b)),
            SqlValue::Date(_) | SqlValue::Timestamp(_) => {
                JsonValue::String(self.as_text().into_owned())
            }
            SqlValue::Json(j) => j.clone(),
            SqlValue::Array(items) => JsonValue::Array(items.iter().map(|v| v.to_json()).collect()),
        }
    }

    /// Build a value from parsed JSON; objects stay JSON, arrays become arrays
    pub fn from_json(value: JsonValue) -> SqlValue {
        match value {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(b) => SqlValue::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => n.as_f64().map(SqlValue::Float).unwrap_or(SqlValue::Null),
            },
            JsonValue::String(s) => SqlValue::Text(s),
            JsonValue::Array(items) => {
                SqlValue::Array(items.into_iter().map(SqlValue::from_json).collect())
            }
            obj @ JsonValue::Object(_) => SqlValue::Json(obj),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
