//! Startup configuration: `.env` loading and pool settings
//!
//! Precedence for every variable: process environment, then `./.env`.
//! `--database-url` on the command line beats both.

use postscope_db::{PoolConfig, Result};
use tracing::{debug, info};

/// Load `.env` from the current directory, if present.
///
/// dotenvy never overwrites variables that are already set.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded .env from {}", path.display()),
        Err(e) if e.not_found() => info!("Using environment variables only (no .env file found)"),
        Err(e) => debug!("Failed to load .env: {}", e),
    }
}

/// Pool settings from the environment, with an optional data-source override.
pub fn pool_config(database_url: Option<String>) -> Result<PoolConfig> {
    pool_config_from(database_url, |key| std::env::var(key).ok())
}

fn pool_config_from<F>(database_url: Option<String>, lookup: F) -> Result<PoolConfig>
where
    F: Fn(&str) -> Option<String>,
{
    PoolConfig::from_lookup(|key| match (key, &database_url) {
        ("DATABASE_URL", Some(url)) => Some(url.clone()),
        _ => lookup(key),
    })
}
