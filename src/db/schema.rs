//! Schema registry and catalog introspection.
//!
//! `SchemaRegistry` is built once per connection from the host's model
//! metadata and never changes afterwards. `SchemaInspector` issues the three
//! read-only catalog queries behind `describe` and merges their rows with the
//! stored definition.

use crate::dialect::{ROW_ORDINAL_COLUMN, escape_literal};
use crate::error::{DbError, DbResult};
use crate::models::{
    CollectionMetadata, ColumnType, DescribedColumn, Query, Record, TableDefinition,
    TableDescription,
};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Per-connection mapping from table name to definition.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, TableDefinition>,
}

impl SchemaRegistry {
    /// Build the registry from host metadata keyed by model name.
    ///
    /// Each model is registered under its `tableName`, falling back to the
    /// model name.
    pub fn build(collections: &BTreeMap<String, CollectionMetadata>) -> DbResult<Self> {
        let mut tables = HashMap::with_capacity(collections.len());

        for (model_name, meta) in collections {
            let table_name = meta.table_name.clone().unwrap_or_else(|| model_name.clone());
            check_reserved_columns(&table_name, meta.definition.keys())?;

            let mut table = TableDefinition::new(&table_name, &meta.definition);
            if let Some(schema_name) = meta.meta.as_ref().and_then(|m| m.schema_name.as_deref()) {
                table = table.with_schema(schema_name);
            }

            if tables.insert(table_name.clone(), table).is_some() {
                return Err(DbError::configuration(format!(
                    "Table '{}' is registered by more than one model",
                    table_name
                )));
            }
        }

        debug!(tables = tables.len(), "Built schema registry");
        Ok(Self { tables })
    }

    /// Look up a table definition.
    pub fn table(&self, name: &str) -> DbResult<&TableDefinition> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::collection_not_found(name))
    }

    /// Look up a table definition without failing.
    pub fn get(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.get(name)
    }

    /// Registered table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Reject columns that collide with the pagination pseudo-column.
pub fn check_reserved_columns<'a>(
    table: &str,
    columns: impl IntoIterator<Item = &'a String>,
) -> DbResult<()> {
    for column in columns {
        if column.eq_ignore_ascii_case(ROW_ORDINAL_COLUMN) {
            return Err(DbError::configuration(format!(
                "Column '{}' on table '{}' uses the reserved name {}",
                column, table, ROW_ORDINAL_COLUMN
            )));
        }
    }
    Ok(())
}

// =============================================================================
// SQL Query Templates
// =============================================================================
//
// Catalog queries for introspection. Table names are interpolated as string
// literals (single quotes doubled); they are never bound.

mod queries {
    pub const DESCRIBE_COLUMNS: &str =
        "SELECT COLUMN_NAME, DATA_TYPE, NULLABLE FROM USER_TAB_COLUMNS WHERE TABLE_NAME = '{table}'";

    pub const DESCRIBE_INDEXES: &str =
        "SELECT index_name,COLUMN_NAME FROM user_ind_columns WHERE TABLE_NAME = '{table}'";

    pub const DESCRIBE_PRIMARY_KEYS: &str = r#"SELECT cols.table_name, cols.column_name, cols.position, cons.status, cons.owner
        FROM all_constraints cons, all_cons_columns cols WHERE cols.table_name =
        '{table}' AND cons.constraint_type = 'P' AND cons.constraint_name = cols.constraint_name AND cons.owner = cols.owner
        ORDER BY cols.table_name, cols.position"#;
}

/// Catalog introspection for `describe`.
pub struct SchemaInspector;

impl SchemaInspector {
    /// The three catalog queries, in the order `merge` expects their results.
    pub fn catalog_queries(table: &str) -> Vec<Query> {
        let literal = escape_literal(table);
        [
            queries::DESCRIBE_COLUMNS,
            queries::DESCRIBE_INDEXES,
            queries::DESCRIBE_PRIMARY_KEYS,
        ]
        .into_iter()
        .map(|template| Query::new(template.replace("{table}", &literal)))
        .collect()
    }

    /// Merge catalog rows with the stored definition.
    ///
    /// Returns an empty description when the catalog has no columns for the
    /// table.
    pub fn merge(
        definition: Option<&TableDefinition>,
        columns: Vec<Record>,
        indexes: Vec<Record>,
        primary_keys: Vec<Record>,
    ) -> TableDescription {
        let mut index_map: HashMap<String, Vec<String>> = HashMap::new();
        for row in &indexes {
            if let (Some(column), Some(index)) =
                (field_str(row, "COLUMN_NAME"), field_str(row, "INDEX_NAME"))
            {
                index_map
                    .entry(column.to_string())
                    .or_default()
                    .push(index.to_string());
            }
        }

        let mut pk_rows: Vec<(i64, &str)> = primary_keys
            .iter()
            .filter_map(|row| {
                let column = field_str(row, "COLUMN_NAME")?;
                let position = field(row, "POSITION").and_then(json_i64).unwrap_or(0);
                Some((position, column))
            })
            .collect();
        pk_rows.sort_by_key(|(position, _)| *position);
        let pk_columns: Vec<&str> = pk_rows.into_iter().map(|(_, column)| column).collect();

        let mut description = TableDescription::new();
        for row in &columns {
            let Some(name) = field_str(row, "COLUMN_NAME") else {
                continue;
            };
            let data_type = field_str(row, "DATA_TYPE").unwrap_or_default().to_string();
            let stored = definition.and_then(|d| d.column(name));

            let column_type = stored
                .map(|c| c.column_type)
                .unwrap_or_else(|| ColumnType::from_oracle(&data_type));
            let primary_key =
                pk_columns.contains(&name) || stored.is_some_and(|c| c.primary_key);

            description.insert(
                name.to_string(),
                DescribedColumn {
                    column_type,
                    data_type,
                    nullable: field_str(row, "NULLABLE") != Some("N"),
                    primary_key,
                    auto_increment: stored.is_some_and(|c| c.auto_increment),
                    indexes: index_map.remove(name).unwrap_or_default(),
                },
            );
        }

        description
    }
}

/// Case-insensitive column lookup; Oracle upper-cases unquoted aliases.
fn field<'a>(row: &'a Record, key: &str) -> Option<&'a JsonValue> {
    row.get(key).or_else(|| {
        row.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn field_str<'a>(row: &'a Record, key: &str) -> Option<&'a str> {
    field(row, key).and_then(JsonValue::as_str)
}

fn json_i64(value: &JsonValue) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}
