//! Table, sequence and trigger DDL.

use super::{qualified_name, quote_identifier, sequence_name, table_ref, trigger_name};
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDefinition, ColumnType, DEFAULT_STRING_SIZE, Query, TableDefinition};

/// Map a logical column type to an Oracle column type.
pub fn column_type_sql(column: &ColumnDefinition) -> String {
    match column.column_type {
        ColumnType::String | ColumnType::Unknown => {
            format!("VARCHAR2({})", column.size.unwrap_or(DEFAULT_STRING_SIZE))
        }
        ColumnType::Text | ColumnType::Json | ColumnType::Array => "CLOB".to_string(),
        ColumnType::Integer => "NUMBER(19)".to_string(),
        ColumnType::Float => "FLOAT".to_string(),
        ColumnType::Boolean => "NUMBER(1)".to_string(),
        ColumnType::Date => "DATE".to_string(),
        ColumnType::Datetime => "TIMESTAMP".to_string(),
        ColumnType::Binary => "BLOB".to_string(),
    }
}

fn column_sql(name: &str, column: &ColumnDefinition) -> DbResult<String> {
    let mut sql = format!("{} {}", quote_identifier(name)?, column_type_sql(column));
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if column.unique && !column.primary_key {
        sql.push_str(" UNIQUE");
    }
    Ok(sql)
}

/// A sequence + before-insert trigger pair emulating one auto-increment column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoIncrementBinding {
    pub table: String,
    pub column: String,
    pub schema: Option<String>,
}

impl AutoIncrementBinding {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }

    /// One binding per auto-increment column of `table`.
    pub fn for_table(table: &TableDefinition) -> Vec<Self> {
        table
            .auto_increment_columns()
            .into_iter()
            .map(|column| {
                Self::new(&table.table_name, column).with_schema(table.schema_name.clone())
            })
            .collect()
    }

    pub fn sequence(&self) -> DbResult<String> {
        qualified_name(
            self.schema.as_deref(),
            &sequence_name(&self.table, &self.column),
        )
    }

    pub fn trigger(&self) -> DbResult<String> {
        qualified_name(
            self.schema.as_deref(),
            &trigger_name(&self.table, &self.column),
        )
    }

    pub fn create_sequence(&self) -> DbResult<Query> {
        Ok(Query::new(format!("CREATE SEQUENCE {}", self.sequence()?)))
    }

    /// Trigger assigning `NEXTVAL` to the column before every insert.
    pub fn create_trigger(&self) -> DbResult<Query> {
        let table = qualified_name(self.schema.as_deref(), &self.table)?;
        Ok(Query::new(format!(
            "CREATE OR REPLACE TRIGGER {} BEFORE INSERT ON {} FOR EACH ROW BEGIN SELECT {}.NEXTVAL INTO :new.{} FROM dual; END;",
            self.trigger()?,
            table,
            self.sequence()?,
            quote_identifier(&self.column)?
        )))
    }

    /// Dropping the table drops the trigger with it; only the sequence
    /// needs its own statement.
    pub fn drop_sequence(&self) -> DbResult<Query> {
        Ok(Query::new(format!("DROP SEQUENCE {}", self.sequence()?)))
    }
}

/// `CREATE TABLE` followed by a sequence and trigger per auto-increment column.
pub fn create_table_statements(table: &TableDefinition) -> DbResult<Vec<Query>> {
    if table.columns.is_empty() {
        return Err(DbError::query_build(format!(
            "Table '{}' has no columns",
            table.table_name
        )));
    }

    let mut specs = table
        .columns
        .iter()
        .map(|(name, column)| column_sql(name, column))
        .collect::<DbResult<Vec<_>>>()?;

    let primary_keys = table.primary_key_columns();
    if !primary_keys.is_empty() {
        let keys = primary_keys
            .into_iter()
            .map(quote_identifier)
            .collect::<DbResult<Vec<_>>>()?;
        specs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    let mut statements = vec![Query::new(format!(
        "CREATE TABLE {} ({})",
        table_ref(table)?,
        specs.join(", ")
    ))];

    for binding in AutoIncrementBinding::for_table(table) {
        statements.push(binding.create_sequence()?);
        statements.push(binding.create_trigger()?);
    }

    Ok(statements)
}

/// `DROP TABLE` plus one `DROP SEQUENCE` per auto-increment column.
pub fn drop_table_statements(table: &TableDefinition) -> DbResult<Vec<Query>> {
    let mut statements = vec![Query::new(format!("DROP TABLE {}", table_ref(table)?))];
    for binding in AutoIncrementBinding::for_table(table) {
        statements.push(binding.drop_sequence()?);
    }
    Ok(statements)
}
