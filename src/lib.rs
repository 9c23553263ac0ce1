//! Oracle adapter library
//!
//! This library translates Waterline-style CRUD operations into Oracle SQL,
//! runs them through pooled connections and normalizes the results.

pub mod adapter;
pub mod config;
pub mod criteria;
pub mod db;
pub mod dialect;
pub mod error;
pub mod models;

pub use adapter::OracleAdapter;
pub use config::{AcquireRetry, Config, PoolOptions};
pub use criteria::Criteria;
pub use error::{DbError, DbResult};
