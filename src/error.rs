//! Error types for the Oracle adapter.
//!
//! This module defines all error types using `thiserror`. Variants follow the
//! lifecycle of an operation: configuration, pool acquisition, query building,
//! execution. Release failures never surface here; they are only logged.

use crate::db::driver::DriverError;
use thiserror::Error;

/// Oracle error code raised when every connection in a pool is busy.
pub const ORA_POOL_SATURATED: &str = "ORA-24418";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("no identity")]
    NoIdentity,

    #[error("duplicate identity: connection '{identity}' is already registered")]
    DuplicateIdentity { identity: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Connection not found: {identity}")]
    ConnectionNotFound { identity: String },

    #[error("No collection with name {collection}")]
    CollectionNotFound { collection: String },

    #[error("Pool exhausted: no free connection for '{identity}' after {waited_ms}ms")]
    PoolExhausted { identity: String, waited_ms: u64 },

    #[error("Failed to acquire connection: {message}")]
    Acquire {
        message: String,
        /// e.g. "ORA-12541" for no listener
        code: Option<String>,
    },

    #[error("Query build error: {message}")]
    QueryBuild { message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g. "ORA-00942" for table or view does not exist
        code: Option<String>,
        suggestion: String,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a duplicate identity error.
    pub fn duplicate_identity(identity: impl Into<String>) -> Self {
        Self::DuplicateIdentity {
            identity: identity.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection not found error.
    pub fn connection_not_found(identity: impl Into<String>) -> Self {
        Self::ConnectionNotFound {
            identity: identity.into(),
        }
    }

    /// Create a collection not found error.
    pub fn collection_not_found(collection: impl Into<String>) -> Self {
        Self::CollectionNotFound {
            collection: collection.into(),
        }
    }

    /// Create a pool exhausted error.
    pub fn pool_exhausted(identity: impl Into<String>, waited_ms: u64) -> Self {
        Self::PoolExhausted {
            identity: identity.into(),
            waited_ms,
        }
    }

    /// Create an acquisition error.
    pub fn acquire(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Acquire {
            message: message.into(),
            code,
        }
    }

    /// Create a query build error.
    pub fn query_build(message: impl Into<String>) -> Self {
        Self::QueryBuild {
            message: message.into(),
        }
    }

    /// Create a database error with an optional ORA code.
    pub fn database(
        message: impl Into<String>,
        code: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            code,
            suggestion: suggestion.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Database { suggestion, .. } => Some(suggestion.as_str()),
            Self::PoolExhausted { .. } => {
                Some("Increase poolMax or the acquire deadline, or reduce concurrent load")
            }
            Self::NoIdentity => Some("Set the 'identity' option on the connection config"),
            _ => None,
        }
    }

    /// Get the ORA code carried by this error, if any.
    pub fn ora_code(&self) -> Option<&str> {
        match self {
            Self::Acquire { code, .. } | Self::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. } | Self::Acquire { .. })
    }

    /// Check if this error was raised before any statement reached the database.
    pub fn is_pre_execution(&self) -> bool {
        matches!(
            self,
            Self::NoIdentity
                | Self::DuplicateIdentity { .. }
                | Self::Configuration { .. }
                | Self::ConnectionNotFound { .. }
                | Self::CollectionNotFound { .. }
                | Self::QueryBuild { .. }
        )
    }
}

/// Convert statement execution failures to DbError.
impl From<DriverError> for DbError {
    fn from(err: DriverError) -> Self {
        let suggestion = suggestion_for_code(err.code.as_deref());
        DbError::database(err.message, err.code, suggestion)
    }
}

/// Map well-known ORA codes to an actionable hint.
fn suggestion_for_code(code: Option<&str>) -> &'static str {
    match code {
        Some("ORA-00942") => "Check that the table exists; run define first",
        Some("ORA-00955") => "The object already exists; drop it before defining again",
        Some("ORA-00001") => "A unique constraint was violated; check for duplicate values",
        Some("ORA-01400") => "A NOT NULL column was given no value",
        Some("ORA-02289") => "The auto-increment sequence is missing; redefine the table",
        Some("ORA-00904") => "Check the referenced column names",
        _ => "Check the SQL and the referenced objects",
    }
}

/// Result type alias for adapter operations.
pub type DbResult<T> = Result<T, DbError>;
