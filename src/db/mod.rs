//! Database access layer.
//!
//! This module provides:
//! - The native client seam (`driver`) and a recording `DryRunDriver`
//! - Connection registry and pooled connection checkout
//! - Batch execution with guaranteed release
//! - Schema registry and catalog introspection

pub mod driver;
pub mod dry_run;
pub mod executor;
pub mod pool;
pub mod schema;

pub use driver::{Driver, DriverConnection, DriverError, DriverPool, PoolSettings};
pub use dry_run::{DryRunDriver, RecordedStatement};
pub use executor::QueryExecutor;
pub use pool::{Connection, ConnectionGuard, ConnectionRegistry};
pub use schema::{SchemaInspector, SchemaRegistry};
