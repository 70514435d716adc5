//! Scoped handle over one checked-out connection

use std::fmt;

use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, warn};

use crate::error::Result;
use crate::source::Transactional;

/// Exclusive access to one pooled connection with an open transaction.
///
/// Release happens in `Drop`, so it runs exactly once whichever way the
/// owning scope ends. A handle dropped before [`finish`](Self::finish)
/// completes has its transaction abandoned rather than committed.
pub struct ScopedHandle<C: Transactional> {
    // Field order matters: the connection goes back to the source before
    // the slot is freed, so the next waiter finds it idle.
    conn: C,
    _permit: OwnedSemaphorePermit,
    auto_commit: bool,
    open: bool,
}

impl<C: Transactional> ScopedHandle<C> {
    pub(crate) fn new(conn: C, permit: OwnedSemaphorePermit, auto_commit: bool) -> Self {
        Self {
            conn,
            _permit: permit,
            auto_commit,
            open: true,
        }
    }

    /// The underlying connection, for issuing statements
    pub fn connection(&mut self) -> &mut C {
        &mut self.conn
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    /// End the transaction and release the connection.
    ///
    /// `succeeded` with auto-commit commits; anything else rolls back.
    pub async fn finish(mut self, succeeded: bool) -> Result<()> {
        let result = if succeeded && self.auto_commit {
            self.conn.commit().await
        } else {
            self.conn.rollback().await
        };

        if result.is_ok() {
            self.open = false;
        }
        result
    }
}

impl<C: Transactional> Drop for ScopedHandle<C> {
    fn drop(&mut self) {
        if self.open {
            warn!("scoped handle released with an open transaction, abandoning it");
            self.conn.abandon();
        }
        debug!("returned database connection to pool");
    }
}

impl<C: Transactional> fmt::Debug for ScopedHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedHandle")
            .field("auto_commit", &self.auto_commit)
            .field("open", &self.open)
            .finish()
    }
}
