//! In-process backend with real transaction semantics.
//!
//! A shared key/value table stands in for the database. Each connection
//! buffers its writes while a transaction is open; commit applies the
//! buffer, rollback and abandon discard it. Connections carry stable ids so
//! exclusivity can be observed from outside.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{DbError, Result};
use crate::source::{ConnectionSource, Transactional};

#[derive(Default)]
struct Shared {
    rows: Mutex<BTreeMap<String, String>>,
    idle: Mutex<Vec<u64>>,
    created: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    abandoned: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connection source over a shared in-memory table
#[derive(Clone, Default)]
pub struct MemorySource {
    shared: Arc<Shared>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source with `count` connections already open and idle
    pub fn with_connections(count: u64) -> Self {
        let source = Self::default();
        lock(&source.shared.idle).extend((0..count).rev());
        source.shared.created.store(count, Ordering::SeqCst);
        source
    }

    /// Committed value for `key`
    pub fn committed(&self, key: &str) -> Option<String> {
        lock(&self.shared.rows).get(key).cloned()
    }

    /// Number of committed rows
    pub fn len(&self) -> usize {
        lock(&self.shared.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn connections_created(&self) -> u64 {
        self.shared.created.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> u64 {
        self.shared.commits.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> u64 {
        self.shared.rollbacks.load(Ordering::SeqCst)
    }

    pub fn abandon_count(&self) -> u64 {
        self.shared.abandoned.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionSource for MemorySource {
    type Connection = MemoryConnection;

    async fn checkout(&self) -> Result<Self::Connection> {
        let reused = lock(&self.shared.idle).pop();
        let id = match reused {
            Some(id) => id,
            None => self.shared.created.fetch_add(1, Ordering::SeqCst),
        };
        Ok(MemoryConnection {
            id,
            shared: Arc::clone(&self.shared),
            pending: None,
        })
    }

    fn idle(&self) -> usize {
        lock(&self.shared.idle).len()
    }
}

/// One connection to a [`MemorySource`]
pub struct MemoryConnection {
    id: u64,
    shared: Arc<Shared>,
    // `None` outside a transaction; inside, `Some(None)` marks a delete.
    pending: Option<BTreeMap<String, Option<String>>>,
}

impl MemoryConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }

    /// Write a row; buffered until commit when a transaction is open.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        match self.pending.as_mut() {
            Some(pending) => {
                pending.insert(key, Some(value));
            }
            None => {
                lock(&self.shared.rows).insert(key, value);
            }
        }
    }

    pub fn delete(&mut self, key: &str) {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.insert(key.to_owned(), None);
            }
            None => {
                lock(&self.shared.rows).remove(key);
            }
        }
    }

    /// Read a row as this connection sees it (own uncommitted writes first).
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(staged) = self.pending.as_ref().and_then(|p| p.get(key)) {
            return staged.clone();
        }
        lock(&self.shared.rows).get(key).cloned()
    }
}

#[async_trait]
impl Transactional for MemoryConnection {
    async fn begin(&mut self) -> Result<()> {
        if self.pending.is_some() {
            return Err(DbError::backend("transaction already in progress"));
        }
        self.pending = Some(BTreeMap::new());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| DbError::backend("no transaction in progress"))?;

        let mut rows = lock(&self.shared.rows);
        for (key, value) in pending {
            match value {
                Some(value) => rows.insert(key, value),
                None => rows.remove(&key),
            };
        }
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.pending = None;
        self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn abandon(&mut self) {
        self.pending = None;
        self.shared.abandoned.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        lock(&self.shared.idle).push(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_are_invisible_until_commit() {
        let source = MemorySource::new();
        let mut conn = source.checkout().await.unwrap();

        conn.begin().await.unwrap();
        conn.put("post:1", "hello");
        assert_eq!(conn.get("post:1").as_deref(), Some("hello"));
        assert_eq!(source.committed("post:1"), None);

        conn.commit().await.unwrap();
        assert_eq!(source.committed("post:1").as_deref(), Some("hello"));
        assert_eq!(source.commit_count(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_buffered_deletes() {
        let source = MemorySource::new();
        let mut conn = source.checkout().await.unwrap();
        conn.put("post:1", "kept");

        conn.begin().await.unwrap();
        conn.delete("post:1");
        assert_eq!(conn.get("post:1"), None);
        conn.rollback().await.unwrap();

        assert_eq!(source.committed("post:1").as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn nested_begin_is_rejected() {
        let source = MemorySource::new();
        let mut conn = source.checkout().await.unwrap();
        conn.begin().await.unwrap();
        assert!(conn.begin().await.is_err());
    }

    #[tokio::test]
    async fn dropped_connections_return_to_idle() {
        let source = MemorySource::with_connections(2);
        assert_eq!(source.idle(), 2);

        let a = source.checkout().await.unwrap();
        let b = source.checkout().await.unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(source.idle(), 0);

        drop(a);
        drop(b);
        assert_eq!(source.idle(), 2);
        assert_eq!(source.connections_created(), 2);
    }
}
