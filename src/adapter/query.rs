use super::OracleAdapter;
use crate::criteria::{Criteria, StatementBuilder};
use crate::dialect::values::normalize_record;
use crate::error::DbResult;
use crate::models::{OutFormat, Record};
use tracing::debug;

impl OracleAdapter {
    /// Rows matching `criteria`, windowed by its skip and limit.
    pub async fn find(&self, identity: &str, table: &str, criteria: &Criteria) -> DbResult<Vec<Record>> {
        let connection = self.connection(identity).await?;
        let definition = connection.schema().table(table)?;

        let query = StatementBuilder::new(definition)?
            .select(criteria)?
            .into_query()
            .with_out_format(OutFormat::Object);
        let result = self.executor.execute_one(&connection, query).await?;

        let records: Vec<Record> = result
            .into_records()
            .into_iter()
            .map(|record| normalize_record(Some(definition), record))
            .collect();

        debug!(identity, table, rows = records.len(), "Find complete");
        Ok(records)
    }
}
