// ABOUTME: Converts one source value into a SQL literal for the target dialect
// ABOUTME: Never fails; malformed values degrade to escaped strings and report why

use crate::dialect::Dialect;
use crate::dump::DialectPair;
use crate::dump::ddl::column_type;
use crate::schema::{ColumnDescriptor, ColumnKind};
use crate::value::SqlValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

/// Epoch values at or above this magnitude are milliseconds, below it seconds
pub const EPOCH_MILLIS_THRESHOLD: i64 = 10_000_000_000;

/// A rendered literal plus the reason it had to fall back, if it did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub sql: String,
    pub fallback: Option<&'static str>,
}

impl Literal {
    fn exact(sql: String) -> Self {
        Self {
            sql,
            fallback: None,
        }
    }

    fn fallback(sql: String, reason: &'static str) -> Self {
        Self {
            sql,
            fallback: Some(reason),
        }
    }

    fn null() -> Self {
        Self::exact("NULL".to_string())
    }
}

/// Render `value` from `column` as a literal the target dialect accepts
///
/// # Examples
///
/// ```
/// # use portable_sql_dump::dialect::Dialect;
/// # use portable_sql_dump::dump::{convert_value, DialectPair};
/// # use portable_sql_dump::schema::ColumnDescriptor;
/// # use portable_sql_dump::value::SqlValue;
/// let column = ColumnDescriptor::new("created_at", "timestamp");
/// let pair = DialectPair::new(Dialect::Sqlite, Dialect::Postgresql);
/// let literal = convert_value(&SqlValue::Int(1700000000), &column, pair);
/// assert_eq!(literal.sql, "'2023-11-14 22:13:20'::timestamp");
/// ```
pub fn convert_value(value: &SqlValue, column: &ColumnDescriptor, pair: DialectPair) -> Literal {
    let kind = ColumnKind::classify(column, pair.source);
    convert_kind(value, &kind, column, pair)
}

fn convert_kind(
    value: &SqlValue,
    kind: &ColumnKind,
    column: &ColumnDescriptor,
    pair: DialectPair,
) -> Literal {
    if value.is_null() {
        return Literal::null();
    }

    match kind {
        ColumnKind::Boolean => Literal::exact(boolean_literal(is_truthy(value), pair.target)),
        ColumnKind::Integer | ColumnKind::Float | ColumnKind::Decimal => {
            numeric_literal(value, pair.target)
        }
        ColumnKind::Timestamp => timestamp_literal(value, pair.target),
        ColumnKind::Date => date_literal(value, pair.target),
        ColumnKind::Binary => Literal::exact(binary_literal(&value_bytes(value), pair.target)),
        ColumnKind::Json => json_literal(value, pair.target),
        ColumnKind::Array(element) => array_literal(value, element, column, pair),
        ColumnKind::Enum
        | ColumnKind::Uuid
        | ColumnKind::Time
        | ColumnKind::Text
        | ColumnKind::Unknown => text_literal(value, pair.target),
    }
}

/// Quote a string literal, doubling single quotes (and backslashes on MySQL)
pub fn quote_string(text: &str, target: Dialect) -> String {
    let escaped = match target {
        Dialect::Mysql => text.replace('\\', "\\\\").replace('\'', "''"),
        Dialect::Sqlite | Dialect::Postgresql => text.replace('\'', "''"),
    };
    format!("'{}'", escaped)
}

pub fn boolean_literal(value: bool, target: Dialect) -> String {
    match (target, value) {
        (Dialect::Postgresql, true) => "TRUE".to_string(),
        (Dialect::Postgresql, false) => "FALSE".to_string(),
        (_, true) => "1".to_string(),
        (_, false) => "0".to_string(),
    }
}

/// Truthiness of a value stored in a boolean-like column
pub fn is_truthy(value: &SqlValue) -> bool {
    match value {
        SqlValue::Null => false,
        SqlValue::Bool(b) => *b,
        SqlValue::Int(i) => *i != 0,
        SqlValue::Float(f) => *f != 0.0,
        SqlValue::Text(s) => text_truthiness(s),
        SqlValue::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) if boolean_token(text).is_some() => text_truthiness(text),
            _ => bytes.iter().any(|b| *b != 0),
        },
        SqlValue::Json(JsonValue::Bool(b)) => *b,
        SqlValue::Json(JsonValue::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        SqlValue::Json(JsonValue::Null) => false,
        SqlValue::Array(items) => !items.is_empty(),
        SqlValue::Json(_) | SqlValue::Date(_) | SqlValue::Timestamp(_) => true,
    }
}

fn boolean_token(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" | "" => Some(false),
        _ => None,
    }
}

fn text_truthiness(text: &str) -> bool {
    if let Some(token) = boolean_token(text) {
        return token;
    }
    match text.trim().parse::<f64>() {
        Ok(number) if is_numeric_text(text.trim()) => number != 0.0,
        _ => true,
    }
}

fn numeric_literal(value: &SqlValue, target: Dialect) -> Literal {
    match value {
        SqlValue::Int(i) => Literal::exact(i.to_string()),
        SqlValue::Bool(b) => Literal::exact(if *b { "1" } else { "0" }.to_string()),
        SqlValue::Float(f) => float_literal(*f, target),
        SqlValue::Text(s) => numeric_text_literal(s, target),
        SqlValue::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => numeric_text_literal(text, target),
            Err(_) => Literal::fallback(
                binary_literal(bytes, target),
                "binary data in numeric column",
            ),
        },
        other => Literal::fallback(
            quote_string(&other.as_text(), target),
            "non-numeric value in numeric column",
        ),
    }
}

fn float_literal(value: f64, target: Dialect) -> Literal {
    if value.is_finite() {
        return Literal::exact(value.to_string());
    }
    let spelled = if value.is_nan() {
        "NaN"
    } else if value > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    };
    match target {
        Dialect::Postgresql => Literal::exact(format!("'{}'", spelled)),
        Dialect::Mysql | Dialect::Sqlite => {
            Literal::fallback("NULL".to_string(), "non-finite number has no literal")
        }
    }
}

fn numeric_text_literal(text: &str, target: Dialect) -> Literal {
    let trimmed = text.trim();
    if is_numeric_text(trimmed) {
        return Literal::exact(trimmed.to_string());
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "nan" => return float_literal(f64::NAN, target),
        "infinity" | "+infinity" | "inf" => return float_literal(f64::INFINITY, target),
        "-infinity" | "-inf" => return float_literal(f64::NEG_INFINITY, target),
        _ => {}
    }
    Literal::fallback(
        quote_string(text, target),
        "non-numeric text in numeric column",
    )
}

/// Plain decimal or scientific notation, nothing SQL could misread
fn is_numeric_text(text: &str) -> bool {
    !text.is_empty()
        && text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        && text.parse::<f64>().is_ok()
}

fn timestamp_literal(value: &SqlValue, target: Dialect) -> Literal {
    match parse_timestamp(value) {
        Some(ts) => Literal::exact(render_timestamp(&ts, target)),
        None => Literal::fallback(
            quote_string(&value.as_text(), target),
            "unparseable timestamp",
        ),
    }
}

fn render_timestamp(ts: &NaiveDateTime, target: Dialect) -> String {
    let text = ts.format("%Y-%m-%d %H:%M:%S%.f").to_string();
    match target {
        Dialect::Postgresql => format!("'{}'::timestamp", text),
        Dialect::Mysql | Dialect::Sqlite => format!("'{}'", text),
    }
}

fn date_literal(value: &SqlValue, target: Dialect) -> Literal {
    let date = match value {
        SqlValue::Date(d) => Some(*d),
        SqlValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .or_else(|| parse_timestamp(value).map(|ts| ts.date())),
        other => parse_timestamp(other).map(|ts| ts.date()),
    };

    match date {
        Some(d) => {
            let text = d.format("%Y-%m-%d");
            Literal::exact(match target {
                Dialect::Postgresql => format!("'{}'::date", text),
                Dialect::Mysql | Dialect::Sqlite => format!("'{}'", text),
            })
        }
        None => Literal::fallback(quote_string(&value.as_text(), target), "unparseable date"),
    }
}

/// Interpret a value as a UTC instant
///
/// Integers are epoch seconds below [`EPOCH_MILLIS_THRESHOLD`] and epoch
/// milliseconds at or above it. Strings may be RFC 3339, `YYYY-MM-DD
/// HH:MM:SS[.f][+zz]`, the `T`-separated form, a bare date, or a number.
pub fn parse_timestamp(value: &SqlValue) -> Option<NaiveDateTime> {
    match value {
        SqlValue::Timestamp(ts) => Some(*ts),
        SqlValue::Date(d) => d.and_hms_opt(0, 0, 0),
        SqlValue::Int(i) => from_epoch(*i),
        SqlValue::Float(f) => from_epoch_float(*f),
        SqlValue::Text(s) => parse_timestamp_text(s),
        SqlValue::Bytes(bytes) => std::str::from_utf8(bytes).ok().and_then(parse_timestamp_text),
        SqlValue::Json(JsonValue::String(s)) => parse_timestamp_text(s),
        SqlValue::Json(JsonValue::Number(n)) => match n.as_i64() {
            Some(i) => from_epoch(i),
            None => n.as_f64().and_then(from_epoch_float),
        },
        _ => None,
    }
}

fn from_epoch(value: i64) -> Option<NaiveDateTime> {
    let instant = if value.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::<Utc>::from_timestamp_millis(value)
    } else {
        DateTime::<Utc>::from_timestamp(value, 0)
    };
    instant.map(|dt| dt.naive_utc())
}

fn from_epoch_float(value: f64) -> Option<NaiveDateTime> {
    if !value.is_finite() {
        return None;
    }
    if value.abs() >= EPOCH_MILLIS_THRESHOLD as f64 {
        return from_epoch(value.trunc() as i64);
    }
    let secs = value.floor();
    let nanos = ((value - secs) * 1_000_000_000.0).round() as u32;
    DateTime::<Utc>::from_timestamp(secs as i64, nanos.min(999_999_999)).map(|dt| dt.naive_utc())
}

fn parse_timestamp_text(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(epoch) = trimmed.parse::<i64>() {
        return from_epoch(epoch);
    }
    if is_numeric_text(trimmed) {
        return trimmed.parse::<f64>().ok().and_then(from_epoch_float);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
            return Some(dt.with_timezone(&Utc).naive_utc());
        }
    }
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn value_bytes(value: &SqlValue) -> Vec<u8> {
    match value {
        SqlValue::Bytes(bytes) => bytes.clone(),
        other => other.as_text().into_owned().into_bytes(),
    }
}

pub fn binary_literal(bytes: &[u8], target: Dialect) -> String {
    let encoded = hex::encode(bytes);
    match target {
        Dialect::Postgresql => format!("'\\x{}'::bytea", encoded),
        Dialect::Mysql | Dialect::Sqlite => format!("X'{}'", encoded),
    }
}

fn json_literal(value: &SqlValue, target: Dialect) -> Literal {
    let text = match value {
        SqlValue::Json(json) => json.to_string(),
        SqlValue::Text(s) => return json_text_literal(s, target),
        SqlValue::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => return json_text_literal(s, target),
            Err(_) => {
                return Literal::fallback(
                    binary_literal(bytes, target),
                    "binary data in JSON column",
                )
            }
        },
        other => other.to_json().to_string(),
    };
    Literal::exact(render_json(&text, target))
}

fn json_text_literal(text: &str, target: Dialect) -> Literal {
    if serde_json::from_str::<JsonValue>(text).is_ok() {
        return Literal::exact(render_json(text, target));
    }
    let sql = match target {
        // jsonb rejects raw text, so wrap it as a JSON string value
        Dialect::Postgresql => render_json(&JsonValue::String(text.to_string()).to_string(), target),
        Dialect::Mysql | Dialect::Sqlite => quote_string(text, target),
    };
    Literal::fallback(sql, "invalid JSON")
}

fn render_json(text: &str, target: Dialect) -> String {
    match target {
        Dialect::Postgresql => format!("{}::jsonb", quote_string(text, target)),
        Dialect::Mysql | Dialect::Sqlite => quote_string(text, target),
    }
}

fn array_literal(
    value: &SqlValue,
    element: &ColumnKind,
    column: &ColumnDescriptor,
    pair: DialectPair,
) -> Literal {
    let items = match value {
        SqlValue::Array(items) => items.clone(),
        SqlValue::Json(JsonValue::Array(_)) => match SqlValue::from_json(value.to_json()) {
            SqlValue::Array(items) => items,
            _ => Vec::new(),
        },
        SqlValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with('{') {
                // Native PostgreSQL array literal, passed through as text
                return Literal::exact(quote_string(trimmed, pair.target));
            }
            match serde_json::from_str::<JsonValue>(trimmed) {
                Ok(JsonValue::Array(values)) => values.into_iter().map(SqlValue::from_json).collect(),
                _ => {
                    return Literal::fallback(
                        quote_string(s, pair.target),
                        "malformed array literal",
                    )
                }
            }
        }
        other => {
            return Literal::fallback(
                quote_string(&other.as_text(), pair.target),
                "scalar value in array column",
            )
        }
    };

    if pair.target != Dialect::Postgresql {
        let json = SqlValue::Array(items).to_json().to_string();
        return Literal::exact(quote_string(&json, pair.target));
    }

    if items.is_empty() {
        return Literal::exact("'{}'".to_string());
    }

    let element_column = column.element_descriptor();
    let mut fallback = None;
    let rendered: Vec<String> = items
        .iter()
        .map(|item| {
            let literal = convert_kind(item, element, &element_column, pair);
            fallback = fallback.or(literal.fallback);
            literal.sql
        })
        .collect();

    // Cast to the column's translated type so enum and domain arrays match their TEXT[] column
    let sql = format!(
        "ARRAY[{}]::{}",
        rendered.join(", "),
        column_type(column, pair)
    );

    Literal { sql, fallback }
}

fn text_literal(value: &SqlValue, target: Dialect) -> Literal {
    match value {
        SqlValue::Text(s) => Literal::exact(quote_string(s, target)),
        SqlValue::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => Literal::exact(quote_string(s, target)),
            Err(_) => Literal::fallback(
                quote_string(&String::from_utf8_lossy(bytes), target),
                "invalid UTF-8 replaced",
            ),
        },
        other => Literal::exact(quote_string(&other.as_text(), target)),
    }
}
