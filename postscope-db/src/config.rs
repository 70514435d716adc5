//! Pool configuration - bounds, data source, and acquisition defaults
//!
//! Loaded from environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MIN_CONN`: connections kept open when idle (default: 1)
//! - `DB_MAX_CONN`: connections that may be checked out at once (default: 10)
//! - `DB_ACQUIRE_TIMEOUT_SECS`: how long a caller waits for a connection (default: 10)
//! - `DB_RETRY_DELAY_SECS`: sleep between checkout attempts (default: 1)

use std::time::Duration;

use crate::error::{DbError, Result};
use crate::pool::AcquireOptions;

pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connection pool configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub database_url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    /// Default `timeout` for acquisitions that don't set their own
    pub acquire_timeout: Duration,
    /// Default `retry_delay` for acquisitions that don't set their own
    pub retry_delay: Duration,
}

impl PoolConfig {
    /// Config with default bounds for the given data source
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            min_connections: DEFAULT_MIN_CONNECTIONS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Set min/max bounds
    pub fn with_bounds(mut self, min_connections: u32, max_connections: u32) -> Self {
        self.min_connections = min_connections;
        self.max_connections = max_connections;
        self
    }

    /// Create config from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup (for testing)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| DbError::config("DATABASE_URL is not set"))?;

        let config = Self {
            database_url,
            min_connections: parse_count(&lookup, "DB_MIN_CONN", DEFAULT_MIN_CONNECTIONS)?,
            max_connections: parse_count(&lookup, "DB_MAX_CONN", DEFAULT_MAX_CONNECTIONS)?,
            acquire_timeout: parse_secs(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", DEFAULT_ACQUIRE_TIMEOUT)?,
            retry_delay: parse_secs(&lookup, "DB_RETRY_DELAY_SECS", DEFAULT_RETRY_DELAY)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check bound consistency.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(DbError::config("DB_MAX_CONN must be at least 1"));
        }
        if self.min_connections > self.max_connections {
            return Err(DbError::config(format!(
                "DB_MIN_CONN ({}) exceeds DB_MAX_CONN ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }

    /// Acquisition options built from the configured defaults (no auto-commit)
    pub fn default_options(&self) -> AcquireOptions {
        AcquireOptions {
            auto_commit: false,
            timeout: self.acquire_timeout,
            retry_delay: self.retry_delay,
        }
    }
}

fn parse_count<F>(lookup: &F, key: &str, default: u32) -> Result<u32>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| DbError::config(format!("{key} must be a non-negative integer, got '{raw}'"))),
    }
}

fn parse_secs<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let secs = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| DbError::config(format!("{key} must be a number of seconds, got '{raw}'")))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| DbError::config(format!("{key} must be finite and non-negative, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_url_is_set() {
        let config = PoolConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/posts")]))
            .expect("valid config");

        assert_eq!(config.database_url, "postgres://localhost/posts");
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(10));
        assert_eq!(config.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn reads_bounds_and_fractional_delays() {
        let config = PoolConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/posts"),
            ("DB_MIN_CONN", "2"),
            ("DB_MAX_CONN", " 8 "),
            ("DB_ACQUIRE_TIMEOUT_SECS", "2.5"),
            ("DB_RETRY_DELAY_SECS", "0.25"),
        ]))
        .expect("valid config");

        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.acquire_timeout, Duration::from_millis(2500));
        assert_eq!(config.retry_delay, Duration::from_millis(250));
    }

    #[test]
    fn missing_url_is_rejected() {
        let err = PoolConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn min_above_max_is_rejected() {
        let err = PoolConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/posts"),
            ("DB_MIN_CONN", "5"),
            ("DB_MAX_CONN", "2"),
        ]))
        .unwrap_err();
        assert!(matches!(err, DbError::Config { .. }));
    }

    #[test]
    fn zero_max_is_rejected() {
        let config = PoolConfig::new("postgres://db/posts").with_bounds(0, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn garbage_numbers_are_rejected() {
        for (key, value) in [
            ("DB_MAX_CONN", "many"),
            ("DB_RETRY_DELAY_SECS", "-1"),
            ("DB_ACQUIRE_TIMEOUT_SECS", "inf"),
        ] {
            let result = PoolConfig::from_lookup(lookup_from(&[
                ("DATABASE_URL", "postgres://db/posts"),
                (key, value),
            ]));
            assert!(result.is_err(), "{key}={value} should be rejected");
        }
    }

    #[test]
    fn default_options_follow_config() {
        let mut config = PoolConfig::new("postgres://db/posts");
        config.acquire_timeout = Duration::from_secs(3);
        config.retry_delay = Duration::from_millis(500);

        let options = config.default_options();
        assert!(!options.auto_commit);
        assert_eq!(options.timeout, Duration::from_secs(3));
        assert_eq!(options.retry_delay, Duration::from_millis(500));
    }
}
