//! Schema-related data models.
//!
//! Host metadata (`CollectionMetadata`, `AttributeDefinition`) is deserialized
//! straight from the ORM's model registration payload. `TableDefinition` is the
//! immutable form the adapter works with after registration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default VARCHAR2 length for string columns without an explicit size.
pub const DEFAULT_STRING_SIZE: u32 = 255;

/// Logical attribute type as declared by the host ORM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    #[serde(alias = "mediumtext", alias = "longtext")]
    Text,
    Integer,
    #[serde(alias = "number", alias = "decimal")]
    Float,
    Boolean,
    Date,
    Datetime,
    Binary,
    Array,
    Json,
    /// Anything the adapter does not recognize is stored as text.
    #[serde(other)]
    Unknown,
}

impl ColumnType {
    /// Get the name used in describe output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String | Self::Unknown => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Binary => "binary",
            Self::Array => "array",
            Self::Json => "json",
        }
    }

    /// Whether values of this type are stored as serialized JSON text.
    pub fn is_serialized(&self) -> bool {
        matches!(self, Self::Json | Self::Array)
    }

    /// Map an Oracle catalog DATA_TYPE back to a logical type.
    pub fn from_oracle(data_type: &str) -> Self {
        let upper = data_type.to_uppercase();
        if upper.starts_with("TIMESTAMP") {
            Self::Datetime
        } else if upper == "DATE" {
            Self::Date
        } else if upper == "CLOB" || upper == "NCLOB" || upper == "LONG" {
            Self::Text
        } else if upper == "BLOB" || upper == "RAW" || upper == "LONG RAW" {
            Self::Binary
        } else if upper == "NUMBER" || upper == "INTEGER" {
            Self::Integer
        } else if upper == "FLOAT" || upper.starts_with("BINARY_") {
            Self::Float
        } else {
            Self::String
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attribute of a host model definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, alias = "required")]
    pub not_null: bool,
    #[serde(default)]
    pub size: Option<u32>,
}

/// Host-side metadata for one model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMetadata {
    /// Defaults to the model name when absent.
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default, alias = "attributes")]
    pub definition: BTreeMap<String, AttributeDefinition>,
    #[serde(default)]
    pub meta: Option<CollectionMeta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMeta {
    #[serde(default)]
    pub schema_name: Option<String>,
}

/// A column as the adapter sees it after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDefinition {
    pub column_type: ColumnType,
    pub nullable: bool,
    pub auto_increment: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub size: Option<u32>,
}

impl From<&AttributeDefinition> for ColumnDefinition {
    fn from(attr: &AttributeDefinition) -> Self {
        Self {
            column_type: attr.column_type,
            nullable: !(attr.not_null || attr.primary_key),
            auto_increment: attr.auto_increment,
            primary_key: attr.primary_key,
            unique: attr.unique,
            size: attr.size,
        }
    }
}

/// Immutable table definition built from host metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDefinition {
    pub table_name: String,
    pub schema_name: Option<String>,
    pub columns: BTreeMap<String, ColumnDefinition>,
}

impl TableDefinition {
    /// Build a definition from a table name and host attributes.
    pub fn new(
        table_name: impl Into<String>,
        attributes: &BTreeMap<String, AttributeDefinition>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            schema_name: None,
            columns: attributes
                .iter()
                .map(|(name, attr)| (name.clone(), ColumnDefinition::from(attr)))
                .collect(),
        }
    }

    /// Set the owning schema.
    pub fn with_schema(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = Some(schema_name.into());
        self
    }

    /// Look up a column.
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.get(name)
    }

    /// Names of auto-increment columns, in column order.
    pub fn auto_increment_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, c)| c.auto_increment)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Names of primary key columns, in column order.
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, c)| c.primary_key)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// One column of a `describe` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescribedColumn {
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Raw catalog type, e.g. "VARCHAR2"
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// Names of indexes covering this column.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<String>,
}

/// Normalized schema of a table, keyed by column name.
pub type TableDescription = BTreeMap<String, DescribedColumn>;
