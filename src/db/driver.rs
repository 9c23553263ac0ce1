//! Native client boundary.
//!
//! The adapter never talks to Oracle directly. A driver implementation is
//! responsible for:
//! - Creating a session pool from `PoolSettings`
//! - Handing out physical connections from that pool
//! - Executing one statement with positional binds and returning a `RawResult`
//! - Rolling back and releasing connections
//!
//! Errors carry the `ORA-NNNNN` code when the database reported one so the
//! adapter can recognize pool saturation and map well-known failures.

use crate::error::ORA_POOL_SATURATED;
use crate::models::{BindParam, ExecuteOptions, RawResult};
use async_trait::async_trait;
use std::time::Duration;

/// Failure reported by the native client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
    pub code: Option<String>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let code = extract_ora_code(&message);
        Self { message, code }
    }

    /// Attach an explicit ORA code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// The error a saturated pool raises.
    pub fn pool_saturated() -> Self {
        Self::new(format!(
            "{}: No more sessions available in the pool",
            ORA_POOL_SATURATED
        ))
    }

    /// Whether this is the "all connections busy" signal.
    pub fn is_pool_saturated(&self) -> bool {
        self.code.as_deref() == Some(ORA_POOL_SATURATED)
            || self.message.contains(ORA_POOL_SATURATED)
    }
}

/// Find an "ORA-NNNNN" token in a driver message.
fn extract_ora_code(message: &str) -> Option<String> {
    let start = message.find("ORA-")?;
    let digits: String = message[start + 4..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    (digits.len() == 5).then(|| format!("ORA-{}", digits))
}

/// Pool parameters resolved from `PoolOptions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub user: Option<String>,
    /// Contains sensitive data - never log
    pub password: Option<String>,
    pub connect_string: Option<String>,
    pub pool_min: u32,
    pub pool_max: u32,
    pub pool_increment: u32,
    pub pool_timeout: Duration,
    pub stmt_cache_size: u32,
}

/// Factory for session pools.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Create a pool. Called once per registered connection.
    async fn create_pool(&self, settings: PoolSettings) -> Result<Box<dyn DriverPool>, DriverError>;
}

/// A session pool owned by one logical connection.
#[async_trait]
pub trait DriverPool: Send + Sync {
    /// Check out a physical connection.
    ///
    /// A saturated pool fails with `ORA-24418`.
    async fn get_connection(&self) -> Result<Box<dyn DriverConnection>, DriverError>;

    /// Close the pool and every idle connection.
    async fn close(&self) -> Result<(), DriverError>;
}

/// A physical connection checked out of a pool.
#[async_trait]
pub trait DriverConnection: Send {
    /// Execute one statement.
    async fn execute(
        &mut self,
        sql: &str,
        binds: &[BindParam],
        options: &ExecuteOptions,
    ) -> Result<RawResult, DriverError>;

    /// Roll back the connection's open transaction.
    async fn rollback(&mut self) -> Result<(), DriverError>;

    /// Return the connection to its pool.
    async fn release(self: Box<Self>) -> Result<(), DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_ora_code() {
        let err = DriverError::new("ORA-00942: table or view does not exist");
        assert_eq!(err.code.as_deref(), Some("ORA-00942"));
    }

    #[test]
    fn test_no_code() {
        let err = DriverError::new("socket closed");
        assert_eq!(err.code, None);
        let err = DriverError::new("ORA-12 truncated");
        assert_eq!(err.code, None);
    }

    #[test]
    fn test_pool_saturated() {
        assert!(DriverError::pool_saturated().is_pool_saturated());
        assert!(
            DriverError::new("NJS-040: connection request timeout")
                .with_code(ORA_POOL_SATURATED)
                .is_pool_saturated()
        );
        assert!(!DriverError::new("ORA-12541: TNS:no listener").is_pool_saturated());
    }
}
