//! Tracing setup for the postscope binary
//!
//! Usage:
//!   postscope --debug                  # Debug logging to console
//!   RUST_LOG=postscope_db=debug postscope
//!   LOG_LEVEL=WARNING postscope        # Coarse level when RUST_LOG is unset

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Tracing configuration options
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Force debug logging unless RUST_LOG is explicitly set
    pub debug: bool,
    /// Raw `LOG_LEVEL` value (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    pub log_level: Option<String>,
}

impl TracingConfig {
    /// Filter directive used when RUST_LOG is unset.
    pub fn fallback_directive(&self) -> &'static str {
        if self.debug {
            return "debug";
        }
        match self
            .log_level
            .as_deref()
            .map(|level| level.trim().to_ascii_uppercase())
            .as_deref()
        {
            Some("TRACE") => "trace",
            Some("DEBUG") => "debug",
            Some("WARN" | "WARNING") => "warn",
            Some("ERROR" | "CRITICAL" | "FATAL") => "error",
            _ => "info",
        }
    }
}

/// Initialize console tracing
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.fallback_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug) // Show targets in debug mode
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
