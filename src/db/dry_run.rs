//! A driver that talks to nothing.
//!
//! Every statement is recorded and answered with an empty result, which lets
//! the CLI print the SQL an operation would run without a database.

use crate::db::driver::{Driver, DriverConnection, DriverError, DriverPool, PoolSettings};
use crate::models::{BindParam, ExecuteOptions, RawResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A statement seen by the dry-run driver.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub binds: Vec<BindParam>,
    pub auto_commit: bool,
}

#[derive(Debug, Default)]
struct Journal {
    statements: Mutex<Vec<RecordedStatement>>,
    pools: AtomicUsize,
}

impl Journal {
    fn push(&self, statement: RecordedStatement) {
        self.statements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(statement);
    }
}

/// Driver that records statements instead of executing them.
#[derive(Debug, Clone, Default)]
pub struct DryRunDriver {
    journal: Arc<Journal>,
}

impl DryRunDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pools created so far.
    pub fn pools_created(&self) -> usize {
        self.journal.pools.load(Ordering::SeqCst)
    }

    /// Statements executed so far, in order.
    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.journal
            .statements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Driver for DryRunDriver {
    async fn create_pool(&self, _settings: PoolSettings) -> Result<Box<dyn DriverPool>, DriverError> {
        self.journal.pools.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(DryRunPool {
            journal: Arc::clone(&self.journal),
        }))
    }
}

struct DryRunPool {
    journal: Arc<Journal>,
}

#[async_trait]
impl DriverPool for DryRunPool {
    async fn get_connection(&self) -> Result<Box<dyn DriverConnection>, DriverError> {
        Ok(Box::new(DryRunConnection {
            journal: Arc::clone(&self.journal),
        }))
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

struct DryRunConnection {
    journal: Arc<Journal>,
}

#[async_trait]
impl DriverConnection for DryRunConnection {
    async fn execute(
        &mut self,
        sql: &str,
        binds: &[BindParam],
        options: &ExecuteOptions,
    ) -> Result<RawResult, DriverError> {
        self.journal.push(RecordedStatement {
            sql: sql.to_string(),
            binds: binds.to_vec(),
            auto_commit: options.auto_commit,
        });

        let is_query = sql.trim_start().get(..6).is_some_and(|s| s.eq_ignore_ascii_case("SELECT"));
        let mut result = if is_query {
            RawResult::with_records(Vec::new())
        } else {
            RawResult::affected(0)
        };
        result.out_binds = binds.iter().filter(|b| b.is_out()).map(|_| Vec::new()).collect();
        Ok(result)
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<(), DriverError> {
        Ok(())
    }
}
