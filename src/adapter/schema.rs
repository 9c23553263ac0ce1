//! Table lifecycle: define, describe, drop.

use super::OracleAdapter;
use crate::db::SchemaInspector;
use crate::db::schema::check_reserved_columns;
use crate::dialect::ddl::{create_table_statements, drop_table_statements};
use crate::dialect::qualified_name;
use crate::error::{DbError, DbResult};
use crate::models::{AttributeDefinition, Query, TableDefinition, TableDescription};
use std::collections::BTreeMap;
use tracing::{debug, info};

impl OracleAdapter {
    /// Create a table, plus a sequence and trigger per auto-increment column.
    ///
    /// A table already known to the connection keeps its schema qualifier.
    pub async fn define(
        &self,
        identity: &str,
        table: &str,
        definition: &BTreeMap<String, AttributeDefinition>,
    ) -> DbResult<()> {
        let connection = self.connection(identity).await?;
        check_reserved_columns(table, definition.keys())?;

        let mut table_def = TableDefinition::new(table, definition);
        if let Some(schema) = connection
            .schema()
            .get(table)
            .and_then(|t| t.schema_name.clone())
        {
            table_def = table_def.with_schema(schema);
        }

        let statements = create_table_statements(&table_def)?;
        let sequences = table_def.auto_increment_columns().len();
        self.executor.execute(&connection, statements).await?;

        info!(identity, table, sequences, "Defined table");
        Ok(())
    }

    /// Describe a table from the catalog.
    ///
    /// `Ok(None)` means the catalog has no such table; query failures are
    /// errors.
    pub async fn describe(&self, identity: &str, table: &str) -> DbResult<Option<TableDescription>> {
        let connection = self.connection(identity).await?;
        let mut results = self
            .executor
            .execute(&connection, SchemaInspector::catalog_queries(table))
            .await?
            .into_iter()
            .map(|r| r.into_records());

        let (Some(columns), Some(indexes), Some(primary_keys)) =
            (results.next(), results.next(), results.next())
        else {
            return Err(DbError::internal("catalog batch returned too few results"));
        };

        let description = SchemaInspector::merge(
            connection.schema().get(table),
            columns,
            indexes,
            primary_keys,
        );
        if description.is_empty() {
            debug!(identity, table, "Table not found in catalog");
            return Ok(None);
        }
        Ok(Some(description))
    }

    /// Drop each of `relations`, then `table`, with their sequences.
    ///
    /// Tables unknown to the connection get a bare `DROP TABLE`.
    pub async fn drop(&self, identity: &str, table: &str, relations: &[String]) -> DbResult<()> {
        let connection = self.connection(identity).await?;

        let mut statements = Vec::new();
        for name in relations.iter().map(String::as_str).chain(std::iter::once(table)) {
            match connection.schema().get(name) {
                Some(definition) => statements.extend(drop_table_statements(definition)?),
                None => statements.push(Query::new(format!(
                    "DROP TABLE {}",
                    qualified_name(None, name)?
                ))),
            }
        }

        let count = statements.len();
        self.executor.execute(&connection, statements).await?;

        info!(identity, table, relations = relations.len(), statements = count, "Dropped table");
        Ok(())
    }
}
