//! Configuration handling for the Oracle adapter.
//!
//! Pool sizing defaults mirror the node-oracledb client defaults the adapter
//! has always shipped with. The CLI configuration is parsed with clap from
//! arguments and environment variables.

use crate::error::{DbError, DbResult};
use crate::models::CollectionMetadata;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Pool configuration defaults
pub const DEFAULT_POOL_MIN: u32 = 1;
pub const DEFAULT_POOL_MAX: u32 = 4;
pub const DEFAULT_POOL_INCREMENT: u32 = 1;
pub const DEFAULT_POOL_TIMEOUT_SECS: u32 = 1;
pub const DEFAULT_STMT_CACHE_SIZE: u32 = 30;
pub const DEFAULT_PREFETCH_ROWS: u32 = 100;

// Saturation retry defaults
pub const DEFAULT_RETRY_INITIAL_BACKOFF_MS: u64 = 10;
pub const DEFAULT_RETRY_MAX_BACKOFF_MS: u64 = 500;

/// Connection pool options as supplied by the host configuration.
///
/// Every field is optional; out-of-range values fall back to the default the
/// same way a missing value does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolOptions {
    /// Minimum connections kept open (default: 1, zero allowed)
    pub pool_min: Option<u32>,
    /// Maximum connections (default: 4, zero means default)
    pub pool_max: Option<u32>,
    /// Connections opened per growth step (default: 1, zero means default)
    pub pool_increment: Option<u32>,
    /// Idle timeout in seconds (default: 1, zero allowed)
    pub pool_timeout: Option<u32>,
    /// Statement cache size (default: 30)
    pub stmt_cache_size: Option<u32>,
    /// Rows fetched per round trip (default: 100)
    pub prefetch_rows: Option<u32>,
    /// Global row cap for queries; only applied when greater than zero
    pub max_rows: Option<u32>,
}

impl PoolOptions {
    /// Get pool_min with default value.
    pub fn pool_min_or_default(&self) -> u32 {
        self.pool_min.unwrap_or(DEFAULT_POOL_MIN)
    }

    /// Get pool_max with default value.
    pub fn pool_max_or_default(&self) -> u32 {
        self.pool_max
            .filter(|max| *max > 0)
            .unwrap_or(DEFAULT_POOL_MAX)
    }

    /// Get pool_increment with default value.
    pub fn pool_increment_or_default(&self) -> u32 {
        self.pool_increment
            .filter(|inc| *inc > 0)
            .unwrap_or(DEFAULT_POOL_INCREMENT)
    }

    /// Get pool_timeout with default value.
    pub fn pool_timeout_or_default(&self) -> Duration {
        Duration::from_secs(u64::from(
            self.pool_timeout.unwrap_or(DEFAULT_POOL_TIMEOUT_SECS),
        ))
    }

    /// Get stmt_cache_size with default value.
    pub fn stmt_cache_size_or_default(&self) -> u32 {
        self.stmt_cache_size.unwrap_or(DEFAULT_STMT_CACHE_SIZE)
    }

    /// Get prefetch_rows with default value.
    pub fn prefetch_rows_or_default(&self) -> u32 {
        self.prefetch_rows.unwrap_or(DEFAULT_PREFETCH_ROWS)
    }

    /// Get the row cap, if one applies.
    pub fn max_rows_cap(&self) -> Option<u32> {
        self.max_rows.filter(|rows| *rows > 0)
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let min = self.pool_min_or_default();
        let max = self.pool_max_or_default();
        if min > max {
            return Err(format!(
                "poolMin ({}) cannot exceed poolMax ({})",
                min, max
            ));
        }
        Ok(())
    }
}

/// Policy for retrying acquisition while the pool is saturated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireRetry {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// None retries until a connection frees up.
    pub deadline: Option<Duration>,
}

impl Default for AcquireRetry {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(DEFAULT_RETRY_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_RETRY_MAX_BACKOFF_MS),
            deadline: None,
        }
    }
}

impl AcquireRetry {
    /// Give up with a pool exhausted error after `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Backoff to wait before the given retry attempt (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Command line configuration for the `oracle-adapter` binary.
#[derive(Debug, Parser)]
#[command(name = "oracle-adapter", version, about = "Print the Oracle DDL generated for a set of models")]
pub struct Config {
    /// JSON file mapping model names to collection metadata
    #[arg(long, env = "ORACLE_ADAPTER_MODELS")]
    pub models: PathBuf,

    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, env = "ORACLE_ADAPTER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "ORACLE_ADAPTER_JSON_LOGS", default_value_t = false)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print CREATE TABLE, sequence and trigger statements
    Define {
        /// Only this table (default: every model)
        table: Option<String>,
    },
    /// Print DROP TABLE and DROP SEQUENCE statements
    Drop {
        table: String,
        /// Dependent tables dropped before the target
        #[arg(long = "relation")]
        relations: Vec<String>,
    },
}

/// Read a JSON file mapping model names to collection metadata.
pub fn load_models(path: &Path) -> DbResult<BTreeMap<String, CollectionMetadata>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        DbError::configuration(format!("Cannot read models file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        DbError::configuration(format!("Invalid models file {}: {}", path.display(), e))
    })
}
