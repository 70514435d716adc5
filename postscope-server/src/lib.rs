//! postscope-server - JSON API over posting activity and toxicity aggregates
//!
//! Three panels read from `chan_posts` and `reddit_posts` through the shared
//! [`postscope_db`] pool:
//! - temporal: volume, weekday rhythm, post length, author activity
//! - toxicity: per-community score averages and sampled distributions
//! - topics: AI topic mentions with toxicity summaries

pub mod config;
pub mod http;
pub mod models;
pub mod panels;
pub mod tracing_setup;

pub use http::{build_router, run_server, ServerConfig};
pub use panels::DbPool;
