#![allow(dead_code)]

use async_trait::async_trait;
use oracle_adapter::OracleAdapter;
use oracle_adapter::config::AcquireRetry;
use oracle_adapter::db::{Driver, DriverConnection, DriverError, DriverPool, PoolSettings};
use oracle_adapter::models::{
    BindParam, CollectionMetadata, ConnectionConfig, ExecuteOptions, RawResult, Record,
};
use serde_json::{Value as JsonValue, json};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const IDENTITY: &str = "t1";

/// A statement as the mock driver received it.
#[derive(Debug, Clone)]
pub struct Executed {
    pub sql: String,
    pub binds: Vec<BindParam>,
    pub options: ExecuteOptions,
}

#[derive(Default)]
struct MockState {
    executed: Mutex<Vec<Executed>>,
    responses: Mutex<VecDeque<Result<RawResult, DriverError>>>,
    acquire_errors: Mutex<VecDeque<DriverError>>,
    saturated_for: AtomicUsize,
    pool_settings: Mutex<Vec<PoolSettings>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
    rollbacks: AtomicUsize,
    pools_closed: AtomicUsize,
    stall: Mutex<Option<(usize, Duration)>>,
}

/// Scripted in-memory driver.
///
/// Statements are answered from a queue of scripted results; with the queue
/// empty, SELECTs return no rows and everything else affects nothing.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<MockState>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_result(&self, result: RawResult) -> &Self {
        self.state.responses.lock().unwrap().push_back(Ok(result));
        self
    }

    pub fn push_rows(&self, rows: Vec<JsonValue>) -> &Self {
        self.push_result(RawResult::with_records(rows.into_iter().map(record).collect()))
    }

    pub fn push_out_binds(&self, out_binds: Vec<Vec<JsonValue>>) -> &Self {
        self.push_result(RawResult {
            rows_affected: Some(out_binds.first().map_or(0, |v| v.len() as u64)),
            out_binds,
            ..RawResult::default()
        })
    }

    pub fn push_error(&self, error: DriverError) -> &Self {
        self.state.responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Fail the next `n` acquisitions with ORA-24418.
    pub fn saturate(&self, n: usize) {
        self.state.saturated_for.store(n, Ordering::SeqCst);
    }

    /// Fail the next acquisition with `error`.
    pub fn fail_next_acquire(&self, error: DriverError) {
        self.state.acquire_errors.lock().unwrap().push_back(error);
    }

    /// Make the statement at position `index` (counted across all
    /// connections) sleep for `duration` before answering.
    pub fn stall_statement(&self, index: usize, duration: Duration) {
        *self.state.stall.lock().unwrap() = Some((index, duration));
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.state.executed.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.executed().into_iter().map(|e| e.sql).collect()
    }

    pub fn pool_settings(&self) -> Vec<PoolSettings> {
        self.state.pool_settings.lock().unwrap().clone()
    }

    pub fn pools_created(&self) -> usize {
        self.state.pool_settings.lock().unwrap().len()
    }

    pub fn pools_closed(&self) -> usize {
        self.state.pools_closed.load(Ordering::SeqCst)
    }

    pub fn acquired(&self) -> usize {
        self.state.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.state.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn create_pool(&self, settings: PoolSettings) -> Result<Box<dyn DriverPool>, DriverError> {
        self.state.pool_settings.lock().unwrap().push(settings);
        Ok(Box::new(MockPool {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockPool {
    state: Arc<MockState>,
}

#[async_trait]
impl DriverPool for MockPool {
    async fn get_connection(&self) -> Result<Box<dyn DriverConnection>, DriverError> {
        if let Some(error) = self.state.acquire_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        let saturated = self
            .state
            .saturated_for
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if saturated {
            return Err(DriverError::pool_saturated());
        }
        self.state.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.state.pools_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockConnection {
    state: Arc<MockState>,
}

#[async_trait]
impl DriverConnection for MockConnection {
    async fn execute(
        &mut self,
        sql: &str,
        binds: &[BindParam],
        options: &ExecuteOptions,
    ) -> Result<RawResult, DriverError> {
        let index = {
            let mut executed = self.state.executed.lock().unwrap();
            executed.push(Executed {
                sql: sql.to_string(),
                binds: binds.to_vec(),
                options: options.clone(),
            });
            executed.len() - 1
        };
        let stall = {
            let mut stall = self.state.stall.lock().unwrap();
            match *stall {
                Some((at, duration)) if at == index => stall.take().map(|_| duration),
                _ => None,
            }
        };
        if let Some(duration) = stall {
            tokio::time::sleep(duration).await;
        }

        if let Some(scripted) = self.state.responses.lock().unwrap().pop_front() {
            return scripted;
        }
        if sql.starts_with("SELECT") {
            Ok(RawResult::with_records(Vec::new()))
        } else {
            Ok(RawResult::affected(0))
        }
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.state.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<(), DriverError> {
        self.state.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn record(value: JsonValue) -> Record {
    value
        .as_object()
        .cloned()
        .unwrap_or_else(|| panic!("expected object, got {value}"))
}

/// Users: auto-increment id, boolean flag, string name.
/// Orders: auto-increment id plus an auto-increment ticket number.
pub fn collections() -> BTreeMap<String, CollectionMetadata> {
    serde_json::from_value(json!({
        "user": {
            "tableName": "users",
            "definition": {
                "id": { "type": "integer", "autoIncrement": true, "primaryKey": true },
                "active": { "type": "boolean" },
                "name": { "type": "string" }
            }
        },
        "order": {
            "tableName": "orders",
            "definition": {
                "id": { "type": "integer", "autoIncrement": true, "primaryKey": true },
                "ticket": { "type": "integer", "autoIncrement": true },
                "status": { "type": "string" },
                "user_id": { "type": "integer" }
            }
        }
    }))
    .unwrap()
}

/// Fast backoff so saturation tests finish quickly.
pub fn fast_retry() -> AcquireRetry {
    AcquireRetry {
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
        deadline: None,
    }
}

/// Adapter with `IDENTITY` registered against a fresh mock driver.
pub async fn setup() -> (OracleAdapter, MockDriver) {
    setup_with_retry(fast_retry()).await
}

pub async fn setup_with_retry(retry: AcquireRetry) -> (OracleAdapter, MockDriver) {
    let driver = MockDriver::new();
    let adapter = OracleAdapter::new(Arc::new(driver.clone())).with_retry(retry);
    adapter
        .register_connection(ConnectionConfig::new(IDENTITY), &collections())
        .await
        .unwrap();
    (adapter, driver)
}
