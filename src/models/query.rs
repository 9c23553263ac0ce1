//! Query-related data models.
//!
//! This module defines the statement shape handed to the driver (`Query`),
//! the values bound into it, and the raw result the driver hands back.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

/// A normalized record: column name to JSON value.
pub type Record = serde_json::Map<String, JsonValue>;

/// Default maximum size for string out binds.
pub const DEFAULT_OUT_STRING_SIZE: u32 = 4000;

/// A value bound into a statement as an IN parameter.
///
/// There is no boolean variant: the dialect stores booleans as NUMBER(1).
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Render the value as JSON (bytes as base64, timestamps as ISO text).
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Int(v) => JsonValue::from(*v),
            Self::Float(v) => JsonValue::from(*v),
            Self::Text(v) => JsonValue::String(v.clone()),
            Self::Timestamp(v) => JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Self::Bytes(v) => JsonValue::String(STANDARD.encode(v)),
        }
    }
}

/// Driver-side type of an OUT bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutKind {
    Number,
    String { max_size: u32 },
    Date,
    Buffer,
    Clob,
}

/// A positional bind: either an input value or an output slot.
#[derive(Debug, Clone, PartialEq)]
pub enum BindParam {
    In(SqlValue),
    Out(OutKind),
}

impl BindParam {
    pub fn is_out(&self) -> bool {
        matches!(self, Self::Out(_))
    }
}

impl From<SqlValue> for BindParam {
    fn from(value: SqlValue) -> Self {
        Self::In(value)
    }
}

/// Row decoding mode requested from the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutFormat {
    /// Rows as column-name keyed objects.
    #[default]
    Object,
    /// Rows as positional arrays; column names in `RawResult::columns`.
    Array,
}

/// One statement plus its binds and execution preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<BindParam>,
    /// Default: true
    pub auto_commit: bool,
    pub out_format: Option<OutFormat>,
    /// Whether the connection's `maxRows` cap applies. Default: true
    pub row_cap: bool,
}

impl Query {
    /// Create a parameterless, auto-committing query.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            auto_commit: true,
            out_format: None,
            row_cap: true,
        }
    }

    /// Replace the bind list.
    pub fn with_params(mut self, params: Vec<BindParam>) -> Self {
        self.params = params;
        self
    }

    /// Request a specific row shape.
    pub fn with_out_format(mut self, format: OutFormat) -> Self {
        self.out_format = Some(format);
        self
    }

    /// Suppress auto-commit so the statement joins the connection's open transaction.
    pub fn without_auto_commit(mut self) -> Self {
        self.auto_commit = false;
        self
    }

    /// Fetch every row regardless of the connection's `maxRows` cap.
    pub fn without_row_cap(mut self) -> Self {
        self.row_cap = false;
        self
    }

    /// Number of OUT slots bound into this query.
    pub fn out_bind_count(&self) -> usize {
        self.params.iter().filter(|p| p.is_out()).count()
    }
}

/// Options passed to the driver with each statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub auto_commit: bool,
    pub out_format: OutFormat,
    /// Connection-wide row cap, if configured.
    pub max_rows: Option<u32>,
    pub prefetch_rows: u32,
}

/// A single row as returned by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Object(Record),
    Array(Vec<JsonValue>),
}

impl Row {
    /// Convert to a record, zipping array rows with the given column names.
    pub fn into_record(self, columns: &[String]) -> Record {
        match self {
            Row::Object(record) => record,
            Row::Array(values) => columns.iter().cloned().zip(values).collect(),
        }
    }
}

/// Unprocessed result of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    /// Present for queries; `None` for DML and DDL.
    pub rows: Option<Vec<Row>>,
    pub columns: Vec<String>,
    pub rows_affected: Option<u64>,
    /// One entry per OUT slot, each holding one value per affected row.
    pub out_binds: Vec<Vec<JsonValue>>,
}

impl RawResult {
    /// Result of a statement that returns no rows.
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected: Some(rows_affected),
            ..Self::default()
        }
    }

    /// Result of a query returning object rows.
    pub fn with_records(records: Vec<Record>) -> Self {
        let columns = records
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        Self {
            rows: Some(records.into_iter().map(Row::Object).collect()),
            columns,
            ..Self::default()
        }
    }

    /// Consume the result and return its rows as records.
    pub fn into_records(self) -> Vec<Record> {
        let columns = self.columns;
        self.rows
            .unwrap_or_default()
            .into_iter()
            .map(|row| row.into_record(&columns))
            .collect()
    }
}

/// Shape of an executed batch: one query yields its result directly.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Single(RawResult),
    Batch(Vec<RawResult>),
}

impl QueryOutput {
    /// Normalize a batch result by its length.
    pub fn from_results(mut results: Vec<RawResult>) -> Self {
        if results.len() == 1 {
            Self::Single(results.remove(0))
        } else {
            Self::Batch(results)
        }
    }

    /// Flatten back into an ordered list.
    pub fn into_vec(self) -> Vec<RawResult> {
        match self {
            Self::Single(result) => vec![result],
            Self::Batch(results) => results,
        }
    }
}
