//! Data access for the dashboard panels
//!
//! Each query runs inside its own scoped handle with auto-commit off, so a
//! failed statement never leaves anything behind on the connection.
//!
//! Schema expectations:
//! - `chan_posts(board_name, author_name, content, created_at timestamptz, <score columns>)`
//! - `reddit_posts(data jsonb, created_at timestamptz, <score columns>)`

pub mod stats;
pub mod temporal;
pub mod topics;
pub mod toxicity;

use postscope_db::{DbError, PgConnectionPool};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::FromRow;

use crate::models::{DateRange, Platform};

/// Pool type shared by every panel
pub type DbPool = PgConnectionPool;

/// Time-ordered points for one platform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformSeries<P> {
    pub platform: Platform,
    pub points: Vec<P>,
}

/// Ranked rows for one platform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformTable<R> {
    pub platform: Platform,
    pub rows: Vec<R>,
}

/// Run `sql` with `$1`/`$2` bound to the range bounds and an optional `$3`.
pub(crate) async fn fetch_in_range<R>(
    pool: &DbPool,
    sql: String,
    range: DateRange,
    extra: Option<i64>,
) -> Result<Vec<R>, DbError>
where
    R: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static,
{
    pool.with_handle(pool.default_options(), move |handle| {
        Box::pin(async move {
            let mut query = sqlx::query_as::<_, R>(&sql).bind(range.start).bind(range.end);
            if let Some(extra) = extra {
                query = query.bind(extra);
            }
            Ok::<_, DbError>(query.fetch_all(handle.cursor()).await?)
        })
    })
    .await
}
