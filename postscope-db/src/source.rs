//! Backend seams for the pool
//!
//! The pool does its own checkout accounting; a [`ConnectionSource`] only
//! has to hand over a live connection once the pool has reserved a slot
//! for it. Dropping the connection gives it back to the source.

use async_trait::async_trait;

use crate::error::Result;

/// Transaction control on a checked-out connection.
#[async_trait]
pub trait Transactional: Send {
    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Called when a handle is dropped with its transaction still open
    /// (cancelled future, panic, failed commit). The connection must not
    /// be handed out again with that transaction attached.
    fn abandon(&mut self);
}

/// Supplier of connections for a [`ConnectionPool`](crate::ConnectionPool).
#[async_trait]
pub trait ConnectionSource: Send + Sync + 'static {
    type Connection: Transactional + 'static;

    /// Produce a connection. Only called while the pool holds a free slot,
    /// so this never waits on capacity, only on connect latency.
    async fn checkout(&self) -> Result<Self::Connection>;

    /// Connections currently open and idle inside the source
    fn idle(&self) -> usize;
}
