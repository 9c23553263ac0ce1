//! Writes: create, create_each, update, destroy.
//!
//! Inserts and updates read every column back through `RETURNING ... INTO`,
//! so generated values (sequence-populated ids, defaults) come back without
//! a second query.

use super::OracleAdapter;
use crate::criteria::{Criteria, Statement, StatementBuilder};
use crate::dialect::ReturningSpec;
use crate::dialect::values::{normalize_record, prepare_values};
use crate::error::{DbError, DbResult};
use crate::models::{OutFormat, Query, RawResult, Record, TableDefinition};
use tracing::debug;

impl OracleAdapter {
    /// Insert one record and return it as stored.
    ///
    /// Boolean columns missing from `values` are written as false.
    pub async fn create(&self, identity: &str, table: &str, values: &Record) -> DbResult<Record> {
        let connection = self.connection(identity).await?;
        let definition = connection.schema().table(table)?;

        let returning = ReturningSpec::for_table(definition);
        let query = insert_query(definition, &returning, values)?;
        let result = self.executor.execute_one(&connection, query).await?;

        let record = read_back(definition, &returning, &result)
            .into_iter()
            .next()
            .ok_or_else(|| DbError::internal(format!("INSERT into '{}' returned no row", table)))?;

        debug!(identity, table, "Created record");
        Ok(record)
    }

    /// Insert several records on one connection, all or nothing.
    ///
    /// Every insert but the last runs without auto-commit; the last commits
    /// the batch. A failure rolls back the inserts before it.
    pub async fn create_each(
        &self,
        identity: &str,
        table: &str,
        values: &[Record],
    ) -> DbResult<Vec<Record>> {
        let connection = self.connection(identity).await?;
        let definition = connection.schema().table(table)?;
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let returning = ReturningSpec::for_table(definition);
        let mut queries = Vec::with_capacity(values.len());
        for (index, record) in values.iter().enumerate() {
            let query = insert_query(definition, &returning, record)?;
            queries.push(if index + 1 < values.len() {
                query.without_auto_commit()
            } else {
                query
            });
        }

        let results = self.executor.execute(&connection, queries).await?;
        let records = results
            .iter()
            .map(|result| {
                read_back(definition, &returning, result)
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        DbError::internal(format!("INSERT into '{}' returned no row", table))
                    })
            })
            .collect::<DbResult<Vec<_>>>()?;

        debug!(identity, table, rows = records.len(), "Created records");
        Ok(records)
    }

    /// Update rows matching `criteria` and return them as stored.
    pub async fn update(
        &self,
        identity: &str,
        table: &str,
        criteria: &Criteria,
        values: &Record,
    ) -> DbResult<Vec<Record>> {
        let connection = self.connection(identity).await?;
        let definition = connection.schema().table(table)?;

        let prepared = prepare_values(definition, values, false)?;
        let statement = StatementBuilder::new(definition)?.update(criteria, prepared)?;
        let returning = ReturningSpec::for_table(definition);
        let query = with_returning(statement, &returning)?;

        let result = self.executor.execute_one(&connection, query).await?;
        let records = read_back(definition, &returning, &result);

        debug!(identity, table, rows = records.len(), "Updated records");
        Ok(records)
    }

    /// Delete rows matching `criteria` and return them as they were.
    ///
    /// The snapshot locks its rows (`FOR UPDATE`) and the DELETE runs on the
    /// same connection in the same transaction, so the result is exactly
    /// the set of rows removed. The snapshot ignores the `maxRows` cap.
    pub async fn destroy(
        &self,
        identity: &str,
        table: &str,
        criteria: &Criteria,
    ) -> DbResult<Vec<Record>> {
        let connection = self.connection(identity).await?;
        let definition = connection.schema().table(table)?;

        let snapshot = StatementBuilder::new(definition)?
            .select_for_update(criteria)?
            .into_query()
            .with_out_format(OutFormat::Object)
            .without_auto_commit()
            .without_row_cap();
        let delete = StatementBuilder::new(definition)?.delete(criteria)?.into_query();

        let mut results = self
            .executor
            .execute(&connection, vec![snapshot, delete])
            .await?;
        if results.len() != 2 {
            return Err(DbError::internal("destroy batch returned wrong result count"));
        }
        let snapshot = results.swap_remove(0);

        let records: Vec<Record> = snapshot
            .into_records()
            .into_iter()
            .map(|record| normalize_record(Some(definition), record))
            .collect();

        debug!(identity, table, rows = records.len(), "Destroyed records");
        Ok(records)
    }
}

fn insert_query(
    definition: &TableDefinition,
    returning: &ReturningSpec,
    values: &Record,
) -> DbResult<Query> {
    let prepared = prepare_values(definition, values, true)?;
    let statement = StatementBuilder::new(definition)?.insert(prepared)?;
    with_returning(statement, returning)
}

fn with_returning(statement: Statement, returning: &ReturningSpec) -> DbResult<Query> {
    let Statement { mut sql, mut params } = statement;
    returning.apply(&mut sql, &mut params)?;
    Ok(Query::new(sql)
        .with_params(params)
        .with_out_format(OutFormat::Object))
}

fn read_back(definition: &TableDefinition, returning: &ReturningSpec, result: &RawResult) -> Vec<Record> {
    returning
        .records(&result.out_binds)
        .into_iter()
        .map(|record| normalize_record(Some(definition), record))
        .collect()
}
