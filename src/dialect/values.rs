//! Value coercion on the way in, normalization on the way out.

use super::ROW_ORDINAL_COLUMN;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDefinition, ColumnType, Record, SqlValue, TableDefinition};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Truthiness as the host ORM understands it.
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

/// Convert one JSON value into a bind value for `column`.
///
/// Columns without a definition get the untyped conversion.
pub fn to_sql_value(column: Option<&ColumnDefinition>, value: &JsonValue) -> DbResult<SqlValue> {
    let column_type = column.map(|c| c.column_type);

    match (column_type, value) {
        (Some(ColumnType::Boolean), v) => Ok(SqlValue::Int(i64::from(is_truthy(v)))),
        (_, JsonValue::Null) => Ok(SqlValue::Null),
        (Some(t), v) if t.is_serialized() => Ok(SqlValue::Text(v.to_string())),
        (Some(ColumnType::Date | ColumnType::Datetime), JsonValue::String(s)) => {
            parse_timestamp(s).map(SqlValue::Timestamp)
        }
        (Some(ColumnType::Binary), JsonValue::String(s)) => STANDARD
            .decode(s)
            .map(SqlValue::Bytes)
            .map_err(|e| DbError::query_build(format!("Invalid base64 binary value: {}", e))),
        (_, v) => Ok(untyped(v)),
    }
}

fn untyped(value: &JsonValue) -> SqlValue {
    match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Int(i64::from(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Int(i),
            None => SqlValue::Float(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => SqlValue::Text(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Parse RFC 3339 or `YYYY-MM-DD[ HH:MM:SS[.fff]]` into a naive UTC timestamp.
pub fn parse_timestamp(s: &str) -> DbResult<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| DbError::query_build(format!("Invalid date value: {:?}", s)))
}

/// Coerce a write payload into ordered `(column, value)` pairs.
///
/// Pairs follow the table's column order. Unknown columns are rejected.
/// With `fill_booleans`, boolean columns missing from `values` are written
/// as 0.
pub fn prepare_values(
    table: &TableDefinition,
    values: &Record,
    fill_booleans: bool,
) -> DbResult<Vec<(String, SqlValue)>> {
    if let Some(unknown) = values.keys().find(|k| table.column(k).is_none()) {
        return Err(DbError::query_build(format!(
            "Unknown column '{}' for table '{}'",
            unknown, table.table_name
        )));
    }

    let mut prepared = Vec::with_capacity(values.len());
    for (name, column) in &table.columns {
        match values.get(name) {
            Some(value) => prepared.push((name.clone(), to_sql_value(Some(column), value)?)),
            None if fill_booleans && column.column_type == ColumnType::Boolean => {
                prepared.push((name.clone(), SqlValue::Int(0)));
            }
            None => {}
        }
    }
    Ok(prepared)
}

/// Normalize a row read back from the database.
///
/// Drops the pagination pseudo-column, turns boolean columns back into
/// `true/false` and parses serialized JSON columns.
pub fn normalize_record(table: Option<&TableDefinition>, mut record: Record) -> Record {
    record.retain(|key, _| !key.eq_ignore_ascii_case(ROW_ORDINAL_COLUMN));

    let Some(table) = table else {
        return record;
    };

    for (name, value) in record.iter_mut() {
        let Some(column) = table.column(name) else {
            continue;
        };
        match column.column_type {
            ColumnType::Boolean if !value.is_null() => {
                *value = JsonValue::Bool(match &*value {
                    JsonValue::String(s) => s != "0" && !s.is_empty(),
                    other => is_truthy(other),
                });
            }
            t if t.is_serialized() => {
                if let Some(parsed) = value
                    .as_str()
                    .and_then(|s| serde_json::from_str::<JsonValue>(s).ok())
                {
                    *value = parsed;
                }
            }
            _ => {}
        }
    }
    record
}
