//! Batch execution engine.
//!
//! A batch is an ordered list of `Query` values run strictly in sequence on
//! one physical connection. The executor:
//! - Checks each query's bind count against its placeholders before any I/O
//! - Acquires exactly one connection for the whole batch
//! - Stops at the first failing statement; no partial results are returned
//! - Rolls back when the batch failed with uncommitted work pending
//! - Releases the connection on every exit path

use crate::db::pool::{Connection, ConnectionGuard};
use crate::dialect::count_placeholders;
use crate::error::{DbError, DbResult};
use crate::models::{Query, QueryOutput, RawResult};
use std::time::Instant;
use tracing::{debug, warn};

/// Runs query batches against a registered connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryExecutor;

impl QueryExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Run `queries` in order and return one result per query.
    pub async fn execute(
        &self,
        connection: &Connection,
        queries: Vec<Query>,
    ) -> DbResult<Vec<RawResult>> {
        for query in &queries {
            check_bind_count(query)?;
        }

        let start = Instant::now();
        let mut guard = connection.acquire().await?;

        let outcome = run_batch(connection, &mut guard, &queries).await;

        if let Err(e) = &outcome {
            warn!(
                identity = %connection.identity(),
                error = %e,
                "Batch failed"
            );
            if guard.in_transaction() {
                guard.rollback().await;
            }
        }
        guard.release().await;

        debug!(
            identity = %connection.identity(),
            statements = queries.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch finished"
        );
        outcome
    }

    /// Run a single query.
    pub async fn execute_one(&self, connection: &Connection, query: Query) -> DbResult<RawResult> {
        self.execute(connection, vec![query])
            .await?
            .pop()
            .ok_or_else(|| DbError::internal("batch of one returned no result"))
    }

    /// Run a batch and shape the output by its length.
    pub async fn execute_output(
        &self,
        connection: &Connection,
        queries: Vec<Query>,
    ) -> DbResult<QueryOutput> {
        self.execute(connection, queries)
            .await
            .map(QueryOutput::from_results)
    }
}

async fn run_batch(
    connection: &Connection,
    guard: &mut ConnectionGuard,
    queries: &[Query],
) -> DbResult<Vec<RawResult>> {
    let mut results = Vec::with_capacity(queries.len());

    for (index, query) in queries.iter().enumerate() {
        let options = connection.execute_options(query);

        debug!(
            identity = %connection.identity(),
            index,
            sql = %query.sql,
            params = query.params.len(),
            out_binds = query.out_bind_count(),
            auto_commit = query.auto_commit,
            row_cap = ?options.max_rows,
            "Executing statement"
        );

        results.push(guard.execute(&query.sql, &query.params, &options).await?);
    }

    Ok(results)
}

/// The bind list must match the placeholders one to one.
pub fn check_bind_count(query: &Query) -> DbResult<()> {
    let placeholders = count_placeholders(&query.sql);
    if placeholders != query.params.len() {
        return Err(DbError::query_build(format!(
            "Statement has {} placeholders but {} binds: {}",
            placeholders,
            query.params.len(),
            query.sql
        )));
    }
    Ok(())
}
