//! postscope - dashboard API server

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;

use postscope_server::config::{load_dotenv, pool_config};
use postscope_server::tracing_setup::{init_tracing, TracingConfig};
use postscope_server::{run_server, DbPool, ServerConfig};

/// Serve the postscope dashboard API
#[derive(Parser, Debug)]
#[command(name = "postscope", version, about)]
struct Args {
    /// Address to bind to
    #[arg(long, short = 'b', env = "POSTSCOPE_BIND", default_value = "127.0.0.1:8501")]
    bind: SocketAddr,

    /// Database URL (overrides DATABASE_URL from the environment or .env)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    cors_permissive: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads env-backed arguments
    load_dotenv();
    let args = Args::parse();

    init_tracing(&TracingConfig {
        debug: args.debug,
        log_level: std::env::var("LOG_LEVEL").ok(),
    })?;

    let config = pool_config(args.database_url)
        .context("DATABASE_URL not set. Set via --database-url, DATABASE_URL env, or ./.env")?;

    tracing::info!("Starting postscope on {}", args.bind);

    let pool = DbPool::connect(config)
        .await
        .context("Failed to create database pool")?;

    run_server(
        pool,
        ServerConfig {
            bind_addr: args.bind,
            cors_permissive: args.cors_permissive,
        },
    )
    .await
    .context("Server error")?;

    Ok(())
}
