//! PostgreSQL backend on top of sqlx's `PgPool`
//!
//! sqlx keeps the physical connections alive (and at least
//! `min_connections` of them open); [`ConnectionPool`](crate::ConnectionPool)
//! decides who may hold one.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::{Executor, PgPool, Postgres};

use crate::config::PoolConfig;
use crate::error::Result;
use crate::handle::ScopedHandle;
use crate::pool::ConnectionPool;
use crate::source::{ConnectionSource, Transactional};

/// Pool manager over PostgreSQL
pub type PgConnectionPool = ConnectionPool<PgSource>;

/// Connection source backed by a sqlx `PgPool`
#[derive(Debug, Clone)]
pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    /// Open the data source, establishing `min_connections` up front.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial connection fails.
    pub async fn connect(config: &PoolConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Build the source without connecting; connections open on first use.
    pub fn connect_lazy(config: &PoolConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy(&config.database_url)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl ConnectionSource for PgSource {
    type Connection = PoolConnection<Postgres>;

    async fn checkout(&self) -> Result<Self::Connection> {
        Ok(self.pool.acquire().await?)
    }

    fn idle(&self) -> usize {
        self.pool.num_idle()
    }
}

#[async_trait]
impl Transactional for PoolConnection<Postgres> {
    async fn begin(&mut self) -> Result<()> {
        (&mut **self).execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        (&mut **self).execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        (&mut **self).execute("ROLLBACK").await?;
        Ok(())
    }

    fn abandon(&mut self) {
        // The server still holds the transaction; closing the socket ends it.
        self.close_on_drop();
    }
}

impl PgConnectionPool {
    /// Connect to PostgreSQL and wrap the result in a pool manager.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = PoolConfig::from_env()?;
    /// let pool = PgConnectionPool::connect(config).await?;
    /// ```
    pub async fn connect(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let source = PgSource::connect(&config).await?;
        ConnectionPool::new(source, config)
    }
}

impl ScopedHandle<PoolConnection<Postgres>> {
    /// Executor for statements inside this handle's transaction
    pub fn cursor(&mut self) -> &mut PgConnection {
        &mut **self.connection()
    }
}
