//! Data models for the Oracle adapter.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionConfig, ConnectionConfigError, ConnectionInfo};
pub use query::{
    BindParam, DEFAULT_OUT_STRING_SIZE, ExecuteOptions, OutFormat, OutKind, Query, QueryOutput,
    RawResult, Record, Row, SqlValue,
};
pub use schema::{
    AttributeDefinition, CollectionMeta, CollectionMetadata, ColumnDefinition, ColumnType,
    DEFAULT_STRING_SIZE, DescribedColumn, TableDefinition, TableDescription,
};
