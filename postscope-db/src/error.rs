//! Structured error types for the connection pool.
//!
//! Exhaustion is the only failure the pool originates itself. Everything
//! raised inside a scoped block belongs to the caller and is returned to
//! them untouched.

use std::time::Duration;

use thiserror::Error;

use crate::pool::PoolStatus;

/// Main error type for pool and backend operations
#[derive(Error, Debug)]
pub enum DbError {
    /// No connection became available before the caller's deadline
    #[error(
        "no database connection available after {:.1}s ({} attempts, {} connections in use)",
        .timeout.as_secs_f64(),
        .attempts,
        .status
    )]
    PoolExhausted {
        timeout: Duration,
        attempts: u32,
        status: PoolStatus,
    },

    /// Statement execution or row decoding failed
    #[error("database error: {0}")]
    Query(#[from] sqlx::Error),

    /// Pool configuration is missing or inconsistent
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// A non-sqlx backend refused an operation
    #[error("backend error: {reason}")]
    Backend { reason: String },
}

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create a backend error
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }

    /// True when the pool gave up waiting for a connection.
    ///
    /// Callers surface this as a transient "service busy" condition.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }
}
