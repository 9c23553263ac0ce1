//! CRUD entry points for the host ORM.
//!
//! `OracleAdapter` ties the pieces together: it looks up the registered
//! connection, builds statements through the criteria translator and dialect
//! rewriters, runs them through `QueryExecutor` and normalizes the rows.
//!
//! Operations are split by concern:
//! - `schema`: define, describe, drop
//! - `query`: find
//! - `write`: create, create_each, update, destroy

mod query;
mod schema;
mod write;

use crate::config::AcquireRetry;
use crate::db::{Connection, ConnectionRegistry, Driver, QueryExecutor};
use crate::error::DbResult;
use crate::models::{CollectionMetadata, ConnectionConfig, ConnectionInfo};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Oracle adapter bound to one driver and one connection registry.
#[derive(Clone)]
pub struct OracleAdapter {
    registry: ConnectionRegistry,
    driver: Arc<dyn Driver>,
    retry: AcquireRetry,
    executor: QueryExecutor,
}

impl std::fmt::Debug for OracleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleAdapter")
            .field("registry", &self.registry)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl OracleAdapter {
    /// Create an adapter with its own empty registry.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            driver,
            retry: AcquireRetry::default(),
            executor: QueryExecutor::new(),
        }
    }

    /// Share an existing registry.
    pub fn with_registry(mut self, registry: ConnectionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Retry policy for connections registered from now on.
    pub fn with_retry(mut self, retry: AcquireRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Register a connection and build its schema registry.
    ///
    /// Fails with `NoIdentity` or `DuplicateIdentity` before any pool is
    /// created.
    pub async fn register_connection(
        &self,
        config: ConnectionConfig,
        collections: &BTreeMap<String, CollectionMetadata>,
    ) -> DbResult<ConnectionInfo> {
        self.registry
            .register(self.driver.as_ref(), config, collections, self.retry.clone())
            .await
    }

    /// Tear down one connection, or every connection when `identity` is None.
    pub async fn teardown(&self, identity: Option<&str>) {
        self.registry.teardown(identity).await;
    }

    async fn connection(&self, identity: &str) -> DbResult<Arc<Connection>> {
        self.registry.get(identity).await
    }
}
