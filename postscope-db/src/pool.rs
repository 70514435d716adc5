//! Bounded connection pool with blocking retry on saturation
//!
//! Checkout accounting lives in a semaphore with one permit per allowed
//! connection. A caller that finds no free permit sleeps for its retry
//! delay and tries again until its timeout runs out, at which point the
//! pool logs a diagnostic snapshot and returns [`DbError::PoolExhausted`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{PoolConfig, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_RETRY_DELAY};
use crate::error::{DbError, Result};
use crate::handle::ScopedHandle;
use crate::source::{ConnectionSource, Transactional};

/// Emit a "pool busy" warning once per this many failed attempts.
const WARN_EVERY_ATTEMPTS: u32 = 5;

/// Floor for the sleep between attempts so a zero delay can't spin.
const MIN_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Per-acquisition settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOptions {
    /// Commit when the scoped block succeeds. Without it the transaction
    /// is rolled back on release.
    pub auto_commit: bool,
    /// Longest wall-clock wait for a free connection
    pub timeout: Duration,
    /// Sleep between checkout attempts while the pool is saturated
    pub retry_delay: Duration,
}

impl AcquireOptions {
    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            auto_commit: false,
            timeout: DEFAULT_ACQUIRE_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Point-in-time view of pool usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Connections checked out right now
    pub in_use: u32,
    /// Open connections sitting idle in the backend
    pub idle: usize,
    /// Configured maximum
    pub max: u32,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.in_use, self.max)
    }
}

/// Process-wide pool of reusable connections.
///
/// Cloning is cheap and every clone shares the same connections, so build
/// one at startup and hand clones to whatever needs data access.
pub struct ConnectionPool<S> {
    inner: Arc<PoolInner<S>>,
}

struct PoolInner<S> {
    source: S,
    config: PoolConfig,
    permits: Arc<Semaphore>,
}

impl<S> Clone for ConnectionPool<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for ConnectionPool<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("min_connections", &self.inner.config.min_connections)
            .field("max_connections", &self.inner.config.max_connections)
            .field("available", &self.inner.permits.available_permits())
            .finish()
    }
}

impl<S: ConnectionSource> ConnectionPool<S> {
    /// Wrap a backend with checkout accounting for `config.max_connections`.
    pub fn new(source: S, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        info!(
            min = config.min_connections,
            max = config.max_connections,
            "database connection pool created"
        );

        let permits = Arc::new(Semaphore::new(config.max_connections as usize));
        Ok(Self {
            inner: Arc::new(PoolInner {
                source,
                config,
                permits,
            }),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Options built from the configured defaults
    pub fn default_options(&self) -> AcquireOptions {
        self.inner.config.default_options()
    }

    pub fn status(&self) -> PoolStatus {
        let max = self.inner.config.max_connections;
        let available = u32::try_from(self.inner.permits.available_permits()).unwrap_or(max);
        PoolStatus {
            in_use: max.saturating_sub(available),
            idle: self.inner.source.idle(),
            max,
        }
    }

    /// Check out a connection and open a transaction on it.
    ///
    /// The returned handle must be closed with [`ScopedHandle::finish`];
    /// dropping it unfinished abandons the transaction but still releases
    /// the connection. Prefer [`with_handle`](Self::with_handle).
    ///
    /// The whole call, backend checkout included, is bounded by
    /// `options.timeout`. A backend that stalls past it, or reports its own
    /// pool timeout, fails as [`DbError::PoolExhausted`].
    pub async fn acquire(&self, options: AcquireOptions) -> Result<ScopedHandle<S::Connection>> {
        let started = Instant::now();
        let (permit, attempts) = self.wait_for_slot(&options, started).await?;

        let remaining = options.timeout.saturating_sub(started.elapsed());
        let mut conn = match tokio::time::timeout(remaining, self.inner.source.checkout()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(DbError::Query(sqlx::Error::PoolTimedOut))) | Err(_) => {
                return Err(self.exhausted(&options, attempts));
            }
            Ok(Err(err)) => return Err(err),
        };
        conn.begin().await?;
        Ok(ScopedHandle::new(conn, permit, options.auto_commit))
    }

    /// Run `block` against an exclusively-owned connection.
    ///
    /// On success the transaction is committed when `auto_commit` is set and
    /// rolled back otherwise. On failure it is rolled back and the block's
    /// error is returned unchanged. The connection goes back to the pool on
    /// every path, including cancellation of the returned future.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let total: i64 = pool
    ///     .with_handle(pool.default_options(), |handle| {
    ///         Box::pin(async move {
    ///             let (n,) = sqlx::query_as("SELECT COUNT(*) FROM chan_posts")
    ///                 .fetch_one(handle.cursor())
    ///                 .await?;
    ///             Ok::<_, DbError>(n)
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_handle<F, T, E>(&self, options: AcquireOptions, block: F) -> std::result::Result<T, E>
    where
        F: for<'h> FnOnce(&'h mut ScopedHandle<S::Connection>) -> BoxFuture<'h, std::result::Result<T, E>> + Send,
        T: Send,
        E: From<DbError> + Send,
    {
        let mut handle = self.acquire(options).await?;

        match block(&mut handle).await {
            Ok(value) => {
                handle.finish(true).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = handle.finish(false).await {
                    warn!(error = %rollback_err, "rollback failed after scoped block error");
                }
                Err(err)
            }
        }
    }

    /// Returns the permit and the number of failed attempts before it.
    async fn wait_for_slot(&self, options: &AcquireOptions, started: Instant) -> Result<(OwnedSemaphorePermit, u32)> {
        let mut attempts: u32 = 0;

        loop {
            match Arc::clone(&self.inner.permits).try_acquire_owned() {
                Ok(permit) => {
                    if attempts > 0 {
                        debug!(
                            attempts,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "acquired database connection after waiting"
                        );
                    }
                    return Ok((permit, attempts));
                }
                Err(TryAcquireError::NoPermits) => {}
                Err(TryAcquireError::Closed) => {
                    return Err(DbError::backend("connection pool is closed"));
                }
            }

            attempts += 1;
            let elapsed = started.elapsed();

            if elapsed >= options.timeout {
                return Err(self.exhausted(options, attempts));
            }

            if attempts % WARN_EVERY_ATTEMPTS == 0 {
                warn!(
                    attempt = attempts,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "pool busy, waiting for a connection"
                );
            }

            let remaining = options.timeout - elapsed;
            let delay = options.retry_delay.max(MIN_RETRY_DELAY).min(remaining);
            tokio::time::sleep(delay).await;
        }
    }

    /// Log the diagnostic snapshot and build the exhaustion error.
    fn exhausted(&self, options: &AcquireOptions, attempts: u32) -> DbError {
        let status = self.status();
        error!(
            attempts,
            in_use = status.in_use,
            max = status.max,
            "pool exhausted after {:.1}s and {} attempts, {} connections in use",
            options.timeout.as_secs_f64(),
            attempts,
            status
        );
        DbError::PoolExhausted {
            timeout: options.timeout,
            attempts,
            status,
        }
    }
}
