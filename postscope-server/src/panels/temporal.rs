//! Temporal panel - posting volume, rhythm, and author activity over time
//!
//! Imageboard figures cover the /g/ board only.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use postscope_db::DbError;
use serde::Serialize;
use sqlx::FromRow;

use super::{fetch_in_range, DbPool, PlatformSeries, PlatformTable};
use crate::models::{Bucket, DateRange, Platform};

const CHAN_BOARD_FILTER: &str = "board_name = 'g'";

/// Reddit has no single text column; length counts body, title and selftext.
const REDDIT_TEXT: &str =
    "COALESCE(data->>'body','') || COALESCE(data->>'title','') || COALESCE(data->>'selftext','')";

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Post count and mean toxicity for one bucket
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ActivityPoint {
    pub t: DateTime<Utc>,
    pub count: i64,
    pub avg_tox: f64,
}

/// Bucketed activity for both platforms
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub bucket: Bucket,
    pub series: Vec<PlatformSeries<ActivityPoint>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformTotal {
    pub platform: Platform,
    pub total_posts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
struct WeekdayRow {
    weekday: i32,
    count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekdayCount {
    pub platform: Platform,
    /// 0 = Sunday
    pub weekday: i32,
    pub day_name: &'static str,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct LengthPoint {
    pub day: DateTime<Utc>,
    pub avg_len: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct AuthorCount {
    pub author: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AuthorHourCount {
    pub author: String,
    pub hour: i32,
    pub count: i64,
}

/// One author's posts per hour of day (UTC)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorHours {
    pub author: String,
    pub total: i64,
    pub hours: [i64; 24],
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct AuthorLength {
    pub author: String,
    pub avg_len: f64,
    pub count: i64,
}

/// Posts and mean toxicity per bucket, one series per platform.
pub async fn posts_per_bucket(
    pool: &DbPool,
    bucket: Bucket,
    range: DateRange,
) -> Result<ActivityReport, DbError> {
    let chan_sql = format!(
        r#"
        SELECT date_trunc('{bucket}', created_at) AS t,
               COUNT(*) AS count,
               COALESCE(AVG(toxicityscore), 0)::float8 AS avg_tox
        FROM chan_posts
        WHERE {CHAN_BOARD_FILTER} AND created_at BETWEEN $1 AND $2
        GROUP BY 1
        ORDER BY 1
        "#,
        bucket = bucket.as_str()
    );
    let reddit_sql = format!(
        r#"
        SELECT date_trunc('{bucket}', created_at) AS t,
               COUNT(*) AS count,
               COALESCE(AVG(COALESCE(toxicityscore, 0)), 0)::float8 AS avg_tox
        FROM reddit_posts
        WHERE created_at BETWEEN $1 AND $2
        GROUP BY 1
        ORDER BY 1
        "#,
        bucket = bucket.as_str()
    );

    let chan = fetch_in_range(pool, chan_sql, range, None).await?;
    let reddit = fetch_in_range(pool, reddit_sql, range, None).await?;

    Ok(ActivityReport {
        start: range.start,
        end: range.end,
        bucket,
        series: vec![
            PlatformSeries {
                platform: Platform::Chan,
                points: chan,
            },
            PlatformSeries {
                platform: Platform::Reddit,
                points: reddit,
            },
        ],
    })
}

/// Total posts per platform inside the window.
pub async fn summary(pool: &DbPool, range: DateRange) -> Result<Vec<PlatformTotal>, DbError> {
    let (chan, reddit) = pool
        .with_handle(pool.default_options(), move |handle| {
            Box::pin(async move {
                let chan: i64 = sqlx::query_scalar(&format!(
                    "SELECT COUNT(*) FROM chan_posts WHERE {CHAN_BOARD_FILTER} AND created_at BETWEEN $1 AND $2"
                ))
                .bind(range.start)
                .bind(range.end)
                .fetch_one(handle.cursor())
                .await?;

                let reddit: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM reddit_posts WHERE created_at BETWEEN $1 AND $2")
                        .bind(range.start)
                        .bind(range.end)
                        .fetch_one(handle.cursor())
                        .await?;

                Ok::<_, DbError>((chan, reddit))
            })
        })
        .await?;

    Ok(vec![
        PlatformTotal {
            platform: Platform::Chan,
            total_posts: chan,
        },
        PlatformTotal {
            platform: Platform::Reddit,
            total_posts: reddit,
        },
    ])
}

/// Post counts by day of week for both platforms.
pub async fn weekday_activity(pool: &DbPool, range: DateRange) -> Result<Vec<WeekdayCount>, DbError> {
    let chan: Vec<WeekdayRow> = fetch_in_range(
        pool,
        format!(
            r#"
            SELECT EXTRACT(DOW FROM created_at)::int AS weekday, COUNT(*) AS count
            FROM chan_posts
            WHERE {CHAN_BOARD_FILTER} AND created_at BETWEEN $1 AND $2
            GROUP BY 1
            ORDER BY 1
            "#
        ),
        range,
        None,
    )
    .await?;
    let reddit: Vec<WeekdayRow> = fetch_in_range(
        pool,
        r#"
        SELECT EXTRACT(DOW FROM created_at)::int AS weekday, COUNT(*) AS count
        FROM reddit_posts
        WHERE created_at BETWEEN $1 AND $2
        GROUP BY 1
        ORDER BY 1
        "#
        .to_owned(),
        range,
        None,
    )
    .await?;

    Ok(label_weekdays(Platform::Chan, chan)
        .chain(label_weekdays(Platform::Reddit, reddit))
        .collect())
}

fn label_weekdays(platform: Platform, rows: Vec<WeekdayRow>) -> impl Iterator<Item = WeekdayCount> {
    rows.into_iter().map(move |row| WeekdayCount {
        platform,
        weekday: row.weekday,
        day_name: day_name(row.weekday),
        count: row.count,
    })
}

/// Short English day name for a Postgres `DOW` value.
pub fn day_name(weekday: i32) -> &'static str {
    usize::try_from(weekday)
        .ok()
        .and_then(|i| DAY_NAMES.get(i))
        .copied()
        .unwrap_or("?")
}

/// Mean post length per day for both platforms.
pub async fn post_length_over_time(
    pool: &DbPool,
    range: DateRange,
) -> Result<Vec<PlatformSeries<LengthPoint>>, DbError> {
    let chan = fetch_in_range(
        pool,
        format!(
            r#"
            SELECT date_trunc('day', created_at) AS day, COALESCE(AVG(LENGTH(content)), 0)::float8 AS avg_len
            FROM chan_posts
            WHERE {CHAN_BOARD_FILTER} AND created_at BETWEEN $1 AND $2
            GROUP BY 1
            ORDER BY 1
            "#
        ),
        range,
        None,
    )
    .await?;
    let reddit = fetch_in_range(
        pool,
        format!(
            r#"
            SELECT date_trunc('day', created_at) AS day, COALESCE(AVG(LENGTH({REDDIT_TEXT})), 0)::float8 AS avg_len
            FROM reddit_posts
            WHERE created_at BETWEEN $1 AND $2
            GROUP BY 1
            ORDER BY 1
            "#
        ),
        range,
        None,
    )
    .await?;

    Ok(vec![
        PlatformSeries {
            platform: Platform::Chan,
            points: chan,
        },
        PlatformSeries {
            platform: Platform::Reddit,
            points: reddit,
        },
    ])
}

/// Most prolific authors, skipping each platform's anonymous/bot author.
pub async fn top_authors(
    pool: &DbPool,
    range: DateRange,
    limit: i64,
) -> Result<Vec<PlatformTable<AuthorCount>>, DbError> {
    let chan = fetch_in_range(
        pool,
        format!(
            r#"
            SELECT author_name AS author, COUNT(*) AS count
            FROM chan_posts
            WHERE {CHAN_BOARD_FILTER} AND created_at BETWEEN $1 AND $2
              AND author_name IS NOT NULL AND author_name <> '{excluded}'
            GROUP BY 1
            ORDER BY 2 DESC, 1
            LIMIT $3
            "#,
            excluded = Platform::Chan.excluded_author()
        ),
        range,
        Some(limit),
    )
    .await?;
    let reddit = fetch_in_range(
        pool,
        format!(
            r#"
            SELECT data->>'author' AS author, COUNT(*) AS count
            FROM reddit_posts
            WHERE created_at BETWEEN $1 AND $2
              AND data->>'author' IS NOT NULL AND data->>'author' <> '{excluded}'
            GROUP BY 1
            ORDER BY 2 DESC, 1
            LIMIT $3
            "#,
            excluded = Platform::Reddit.excluded_author()
        ),
        range,
        Some(limit),
    )
    .await?;

    Ok(vec![
        PlatformTable {
            platform: Platform::Chan,
            rows: chan,
        },
        PlatformTable {
            platform: Platform::Reddit,
            rows: reddit,
        },
    ])
}

/// Hour-of-day posting histogram for the `top_n` most active authors.
pub async fn author_hour_pattern(
    pool: &DbPool,
    range: DateRange,
    top_n: usize,
) -> Result<Vec<PlatformTable<AuthorHours>>, DbError> {
    let chan: Vec<AuthorHourCount> = fetch_in_range(
        pool,
        format!(
            r#"
            SELECT author_name AS author, DATE_PART('hour', created_at)::int AS hour, COUNT(*) AS count
            FROM chan_posts
            WHERE {CHAN_BOARD_FILTER} AND created_at BETWEEN $1 AND $2
              AND author_name IS NOT NULL AND author_name <> '{excluded}'
            GROUP BY 1, 2
            "#,
            excluded = Platform::Chan.excluded_author()
        ),
        range,
        None,
    )
    .await?;
    let reddit: Vec<AuthorHourCount> = fetch_in_range(
        pool,
        format!(
            r#"
            SELECT data->>'author' AS author, DATE_PART('hour', created_at)::int AS hour, COUNT(*) AS count
            FROM reddit_posts
            WHERE created_at BETWEEN $1 AND $2
              AND data->>'author' IS NOT NULL AND data->>'author' <> '{excluded}'
            GROUP BY 1, 2
            "#,
            excluded = Platform::Reddit.excluded_author()
        ),
        range,
        None,
    )
    .await?;

    Ok(vec![
        PlatformTable {
            platform: Platform::Chan,
            rows: pivot_author_hours(chan, top_n),
        },
        PlatformTable {
            platform: Platform::Reddit,
            rows: pivot_author_hours(reddit, top_n),
        },
    ])
}

/// Fold (author, hour, count) rows into per-author histograms, keeping the
/// `top_n` authors by total posts (ties broken by name).
pub fn pivot_author_hours(rows: Vec<AuthorHourCount>, top_n: usize) -> Vec<AuthorHours> {
    let mut by_author: HashMap<String, [i64; 24]> = HashMap::new();
    for row in rows {
        let Some(slot) = usize::try_from(row.hour).ok().filter(|h| *h < 24) else {
            continue;
        };
        by_author.entry(row.author).or_insert([0; 24])[slot] += row.count;
    }

    let mut authors: Vec<AuthorHours> = by_author
        .into_iter()
        .map(|(author, hours)| AuthorHours {
            total: hours.iter().sum(),
            author,
            hours,
        })
        .collect();
    authors.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.author.cmp(&b.author)));
    authors.truncate(top_n);
    authors
}

/// Authors with the longest posts on average.
pub async fn avg_length_by_author(
    pool: &DbPool,
    range: DateRange,
    limit: i64,
) -> Result<Vec<PlatformTable<AuthorLength>>, DbError> {
    let chan = fetch_in_range(
        pool,
        format!(
            r#"
            SELECT author_name AS author, COALESCE(AVG(LENGTH(content)), 0)::float8 AS avg_len, COUNT(*) AS count
            FROM chan_posts
            WHERE {CHAN_BOARD_FILTER} AND created_at BETWEEN $1 AND $2 AND author_name IS NOT NULL
            GROUP BY 1
            ORDER BY 2 DESC NULLS LAST, 1
            LIMIT $3
            "#
        ),
        range,
        Some(limit),
    )
    .await?;
    let reddit = fetch_in_range(
        pool,
        format!(
            r#"
            SELECT data->>'author' AS author, COALESCE(AVG(LENGTH({REDDIT_TEXT})), 0)::float8 AS avg_len, COUNT(*) AS count
            FROM reddit_posts
            WHERE created_at BETWEEN $1 AND $2 AND data->>'author' IS NOT NULL
            GROUP BY 1
            ORDER BY 2 DESC NULLS LAST, 1
            LIMIT $3
            "#
        ),
        range,
        Some(limit),
    )
    .await?;

    Ok(vec![
        PlatformTable {
            platform: Platform::Chan,
            rows: chan,
        },
        PlatformTable {
            platform: Platform::Reddit,
            rows: reddit,
        },
    ])
}
