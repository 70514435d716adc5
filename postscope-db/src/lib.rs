//! postscope-db: bounded connection pool with scoped transactional handles
//!
//! # Design Principles
//!
//! - One pool per process, built at startup and passed around explicitly
//! - Checked-out connections never exceed the configured maximum
//! - Saturation waits (sleep + retry) up to a deadline, then fails as exhaustion
//! - Commit on success, rollback on failure, release always

pub mod config;
pub mod error;
pub mod handle;
pub mod memory;
pub mod pool;
pub mod postgres;
pub mod source;

pub use config::PoolConfig;
pub use error::{DbError, Result};
pub use handle::ScopedHandle;
pub use memory::{MemoryConnection, MemorySource};
pub use pool::{AcquireOptions, ConnectionPool, PoolStatus};
pub use postgres::{PgConnectionPool, PgSource};
pub use source::{ConnectionSource, Transactional};
