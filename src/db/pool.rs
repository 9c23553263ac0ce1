//! Connection pool management.
//!
//! One pool per registered logical connection, held in an injectable
//! `ConnectionRegistry`. Physical connections are checked out through
//! `Connection::acquire`, which treats pool saturation (`ORA-24418`) as
//! backpressure and retries, and are handed back through `ConnectionGuard`.

use crate::config::AcquireRetry;
use crate::db::driver::{Driver, DriverConnection, DriverPool, PoolSettings};
use crate::db::schema::SchemaRegistry;
use crate::error::{DbError, DbResult};
use crate::models::{
    BindParam, CollectionMetadata, ConnectionConfig, ConnectionInfo, ExecuteOptions, OutFormat,
    Query, RawResult,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A registered logical connection: its pool plus the schema registry built
/// from the host's model metadata.
pub struct Connection {
    identity: String,
    pool: Box<dyn DriverPool>,
    schema: SchemaRegistry,
    max_rows: Option<u32>,
    prefetch_rows: u32,
    retry: AcquireRetry,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("identity", &self.identity)
            .field("tables", &self.schema.table_names())
            .field("max_rows", &self.max_rows)
            .field("prefetch_rows", &self.prefetch_rows)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Execution options for `query` on this connection.
    ///
    /// The `maxRows` cap is left off for queries that opted out of it.
    pub fn execute_options(&self, query: &Query) -> ExecuteOptions {
        ExecuteOptions {
            auto_commit: query.auto_commit,
            out_format: query.out_format.unwrap_or(OutFormat::Object),
            max_rows: self.max_rows.filter(|_| query.row_cap),
            prefetch_rows: self.prefetch_rows,
        }
    }

    /// Check out a physical connection.
    ///
    /// A saturated pool is retried with capped exponential backoff. Without a
    /// configured deadline the retry never gives up; with one, it fails with
    /// `DbError::PoolExhausted`. Any other failure propagates immediately.
    pub async fn acquire(&self) -> DbResult<ConnectionGuard> {
        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            match self.pool.get_connection().await {
                Ok(conn) => {
                    if attempt > 0 {
                        debug!(
                            identity = %self.identity,
                            attempts = attempt + 1,
                            waited_ms = start.elapsed().as_millis() as u64,
                            "Acquired connection after pool saturation"
                        );
                    }
                    return Ok(ConnectionGuard::new(conn, self.identity.clone()));
                }
                Err(e) if e.is_pool_saturated() => {
                    let waited = start.elapsed();
                    let mut backoff = self.retry.backoff(attempt);
                    if let Some(deadline) = self.retry.deadline {
                        if waited >= deadline {
                            warn!(
                                identity = %self.identity,
                                waited_ms = waited.as_millis() as u64,
                                "Pool saturated past the acquire deadline"
                            );
                            return Err(DbError::pool_exhausted(
                                &self.identity,
                                waited.as_millis() as u64,
                            ));
                        }
                        backoff = backoff.min(deadline - waited);
                    }
                    debug!(
                        identity = %self.identity,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Pool saturated, retrying acquisition"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(e) => return Err(DbError::acquire(e.message, e.code)),
            }
        }
    }

    async fn close(&self) {
        if let Err(e) = self.pool.close().await {
            warn!(identity = %self.identity, error = %e, "Problem closing pool");
        }
    }
}

/// Process-wide table of registered connections.
///
/// Mutated only by `register` and `teardown`; CRUD operations take a read
/// lock just long enough to clone the `Arc<Connection>` they need.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<String, Arc<Connection>>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection: build its schema registry and create its pool.
    pub async fn register(
        &self,
        driver: &dyn Driver,
        config: ConnectionConfig,
        collections: &BTreeMap<String, CollectionMetadata>,
        retry: AcquireRetry,
    ) -> DbResult<ConnectionInfo> {
        let identity = config.identity.clone();
        if identity.is_empty() {
            return Err(DbError::NoIdentity);
        }

        // Early check for existing connection
        if self.connections.read().await.contains_key(&identity) {
            return Err(DbError::duplicate_identity(identity));
        }

        let opts = &config.pool_options;
        opts.validate().map_err(DbError::configuration)?;
        let schema = SchemaRegistry::build(collections)?;

        let settings = PoolSettings {
            user: config.user.clone(),
            password: config.password.clone(),
            connect_string: config.connect_string.clone(),
            pool_min: opts.pool_min_or_default(),
            pool_max: opts.pool_max_or_default(),
            pool_increment: opts.pool_increment_or_default(),
            pool_timeout: opts.pool_timeout_or_default(),
            stmt_cache_size: opts.stmt_cache_size_or_default(),
        };

        info!(
            identity = %identity,
            target = %config.masked_connect_string(),
            pool_min = settings.pool_min,
            pool_max = settings.pool_max,
            tables = schema.len(),
            "Registering connection"
        );

        let pool = driver
            .create_pool(settings.clone())
            .await
            .map_err(|e| DbError::acquire(format!("Failed to create pool: {}", e), e.code))?;

        let connection = Arc::new(Connection {
            identity: identity.clone(),
            pool,
            schema,
            max_rows: opts.max_rows_cap(),
            prefetch_rows: opts.prefetch_rows_or_default(),
            retry,
        });

        let info = ConnectionInfo {
            identity: identity.clone(),
            collections: connection.schema.table_names(),
            pool_min: settings.pool_min,
            pool_max: settings.pool_max,
            max_rows: connection.max_rows,
        };

        // Re-check after async work to prevent TOCTOU race
        let duplicate = {
            let mut connections = self.connections.write().await;
            if connections.contains_key(&identity) {
                Some(connection)
            } else {
                connections.insert(identity.clone(), connection);
                None
            }
        }; // Lock released here

        if let Some(orphan) = duplicate {
            orphan.close().await;
            return Err(DbError::duplicate_identity(identity));
        }

        info!(identity = %identity, "Connection registered");
        Ok(info)
    }

    /// Get a registered connection.
    pub async fn get(&self, identity: &str) -> DbResult<Arc<Connection>> {
        self.connections
            .read()
            .await
            .get(identity)
            .cloned()
            .ok_or_else(|| DbError::connection_not_found(identity))
    }

    /// Check out a physical connection from a registered pool.
    pub async fn acquire(&self, identity: &str) -> DbResult<ConnectionGuard> {
        self.get(identity).await?.acquire().await
    }

    /// Check if a connection exists.
    pub async fn exists(&self, identity: &str) -> bool {
        self.connections.read().await.contains_key(identity)
    }

    /// List all registered identities.
    pub async fn identities(&self) -> Vec<String> {
        self.connections.read().await.keys().cloned().collect()
    }

    /// Get the number of registered connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove one connection, or all of them when `identity` is None.
    ///
    /// Unknown identities are ignored. Removed pools are closed; close
    /// failures are logged only.
    pub async fn teardown(&self, identity: Option<&str>) {
        let removed: Vec<Arc<Connection>> = {
            let mut connections = self.connections.write().await;
            match identity {
                None => connections.drain().map(|(_, c)| c).collect(),
                Some(id) => connections.remove(id).into_iter().collect(),
            }
        }; // Lock released here

        if removed.is_empty() {
            debug!(identity = ?identity, "Teardown found nothing to remove");
            return;
        }

        for connection in removed {
            info!(identity = %connection.identity, "Tearing down connection");
            connection.close().await;
        }
    }
}

/// Exclusive handle on one physical connection.
///
/// Call `release().await` on every path. If the guard is dropped without
/// being released (error unwinding past it, or the owning future being
/// cancelled), `Drop` spawns the release on the current runtime, rolling
/// back first when a transaction was left open.
pub struct ConnectionGuard {
    conn: Option<Box<dyn DriverConnection>>,
    identity: String,
    /// Set while uncommitted work from a non-auto-commit statement is pending.
    in_transaction: bool,
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("identity", &self.identity)
            .field("released", &self.conn.is_none())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl ConnectionGuard {
    fn new(conn: Box<dyn DriverConnection>, identity: String) -> Self {
        Self {
            conn: Some(conn),
            identity,
            in_transaction: false,
        }
    }

    /// Execute one statement on the held connection.
    ///
    /// A statement without auto-commit opens (or extends) a transaction; a
    /// successful auto-committing statement commits it.
    pub async fn execute(
        &mut self,
        sql: &str,
        binds: &[BindParam],
        options: &ExecuteOptions,
    ) -> DbResult<RawResult> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| DbError::internal("connection already released"))?;
        if !options.auto_commit {
            self.in_transaction = true;
        }
        let result = conn.execute(sql, binds, options).await?;
        if options.auto_commit {
            self.in_transaction = false;
        }
        Ok(result)
    }

    /// Whether uncommitted work is pending on the connection.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Roll back the open transaction. Failures are logged only.
    pub async fn rollback(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            if let Err(e) = conn.rollback().await {
                warn!(identity = %self.identity, error = %e, "Problem rolling back connection");
            }
        }
        self.in_transaction = false;
    }

    /// Return the connection to its pool. Failures are logged only.
    pub async fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.release().await {
                warn!(identity = %self.identity, error = %e, "Problem releasing connection");
            }
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let identity = std::mem::take(&mut self.identity);
        let in_transaction = self.in_transaction;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let mut conn = conn;
                    if in_transaction {
                        if let Err(e) = conn.rollback().await {
                            warn!(identity = %identity, error = %e, "Problem rolling back connection");
                        }
                    }
                    if let Err(e) = conn.release().await {
                        warn!(identity = %identity, error = %e, "Problem releasing connection");
                    }
                    warn!(identity = %identity, "Connection released via Drop");
                });
            }
            Err(_) => {
                warn!(identity = %identity, "No runtime to release connection; it is leaked");
            }
        }
    }
}
