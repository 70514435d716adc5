//! Toxicity comparison across communities
//!
//! A community is either a chan board or a subreddit, compared by a single
//! score column. Averages treat missing scores as zero; distributions only
//! sample posts that were scored.

use std::collections::HashSet;

use postscope_db::DbError;
use serde::Serialize;
use sqlx::PgConnection;

use super::stats::DistributionStats;
use super::DbPool;
use crate::models::{DateRange, Platform, ToxicityMetric};

/// Upper bound on the random sample returned per community
pub const DISTRIBUTION_SAMPLE: i64 = 2000;

/// Trim, lowercase, and drop a leading `r/`. `None` when nothing is left.
pub fn normalize_community(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let name = lowered.strip_prefix("r/").unwrap_or(&lowered).trim();
    (!name.is_empty()).then(|| name.to_owned())
}

/// Every subreddit and chan board with posts, subreddits first.
pub async fn communities(pool: &DbPool) -> Result<Vec<String>, DbError> {
    pool.with_handle(pool.default_options(), |handle| {
        Box::pin(async move {
            let subreddits: Vec<Option<String>> = sqlx::query_scalar(
                r#"
                SELECT DISTINCT COALESCE(
                    NULLIF(data->>'subreddit', ''),
                    NULLIF(data->>'subreddit_name_prefixed', '')
                )
                FROM reddit_posts
                WHERE data->>'subreddit' IS NOT NULL OR data->>'subreddit_name_prefixed' IS NOT NULL
                "#,
            )
            .fetch_all(handle.cursor())
            .await?;

            let boards: Vec<Option<String>> = sqlx::query_scalar("SELECT DISTINCT board_name FROM chan_posts")
                .fetch_all(handle.cursor())
                .await?;

            Ok::<_, DbError>(merge_communities(subreddits.into_iter().chain(boards).flatten()))
        })
    })
    .await
}

fn merge_communities(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter_map(|raw| normalize_community(&raw))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Parameters for [`toxicity`]
#[derive(Debug, Clone, PartialEq)]
pub struct ToxicityRequest {
    pub platforms: Vec<Platform>,
    pub communities: Vec<String>,
    pub metric: ToxicityMetric,
    pub range: DateRange,
}

/// Score summary for one community on one platform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunityToxicity {
    pub community: String,
    pub platform: Platform,
    pub metric: ToxicityMetric,
    pub average: f64,
    pub distribution: Vec<f64>,
    pub stats: Option<DistributionStats>,
}

impl CommunityToxicity {
    fn new(community: &str, platform: Platform, metric: ToxicityMetric, average: f64, distribution: Vec<f64>) -> Self {
        Self {
            community: community.to_owned(),
            platform,
            metric,
            average,
            stats: DistributionStats::from_samples(&distribution),
            distribution,
        }
    }
}

/// Average and sampled distribution of `metric` per requested community.
///
/// The window is widened to whole days. Chan entries appear only for names
/// that exist as boards; reddit entries appear for every name.
pub async fn toxicity(pool: &DbPool, request: ToxicityRequest) -> Result<Vec<CommunityToxicity>, DbError> {
    let range = request.range.whole_days();
    let metric = request.metric;
    let wants_chan = request.platforms.contains(&Platform::Chan);
    let wants_reddit = request.platforms.contains(&Platform::Reddit);
    let names: Vec<String> = request
        .communities
        .iter()
        .filter_map(|raw| normalize_community(raw))
        .collect();

    if names.is_empty() || !(wants_chan || wants_reddit) {
        return Ok(Vec::new());
    }

    pool.with_handle(pool.default_options(), move |handle| {
        Box::pin(async move {
            let conn = handle.cursor();
            let mut results = Vec::new();
            for name in &names {
                if wants_chan && board_exists(conn, name).await? {
                    let (average, distribution) = chan_scores(conn, name, metric, range).await?;
                    results.push(CommunityToxicity::new(name, Platform::Chan, metric, average, distribution));
                }
                if wants_reddit {
                    let (average, distribution) = reddit_scores(conn, name, metric, range).await?;
                    results.push(CommunityToxicity::new(name, Platform::Reddit, metric, average, distribution));
                }
            }
            Ok::<_, DbError>(results)
        })
    })
    .await
}

async fn board_exists(conn: &mut PgConnection, name: &str) -> Result<bool, DbError> {
    let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM chan_posts WHERE LOWER(board_name) = $1 LIMIT 1")
        .bind(name)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

async fn chan_scores(
    conn: &mut PgConnection,
    board: &str,
    metric: ToxicityMetric,
    range: DateRange,
) -> Result<(f64, Vec<f64>), DbError> {
    let column = metric.column();
    let average: f64 = sqlx::query_scalar(&format!(
        r#"
        SELECT COALESCE(AVG(COALESCE({column}, 0)), 0)::float8
        FROM chan_posts
        WHERE LOWER(board_name) = $1 AND created_at BETWEEN $2 AND $3
        "#
    ))
    .bind(board)
    .bind(range.start)
    .bind(range.end)
    .fetch_one(&mut *conn)
    .await?;

    let distribution: Vec<f64> = sqlx::query_scalar(&format!(
        r#"
        SELECT {column}::float8
        FROM chan_posts
        WHERE LOWER(board_name) = $1 AND created_at BETWEEN $2 AND $3 AND {column} IS NOT NULL
        ORDER BY random()
        LIMIT $4
        "#
    ))
    .bind(board)
    .bind(range.start)
    .bind(range.end)
    .bind(DISTRIBUTION_SAMPLE)
    .fetch_all(&mut *conn)
    .await?;

    Ok((average, distribution))
}

async fn reddit_scores(
    conn: &mut PgConnection,
    subreddit: &str,
    metric: ToxicityMetric,
    range: DateRange,
) -> Result<(f64, Vec<f64>), DbError> {
    let column = metric.column();
    let prefixed = format!("r/{subreddit}");
    let average: f64 = sqlx::query_scalar(&format!(
        r#"
        SELECT COALESCE(AVG(COALESCE({column}, 0)), 0)::float8
        FROM reddit_posts
        WHERE (LOWER(data->>'subreddit') = $1 OR LOWER(data->>'subreddit_name_prefixed') = $2)
          AND created_at BETWEEN $3 AND $4
        "#
    ))
    .bind(subreddit)
    .bind(&prefixed)
    .bind(range.start)
    .bind(range.end)
    .fetch_one(&mut *conn)
    .await?;

    let distribution: Vec<f64> = sqlx::query_scalar(&format!(
        r#"
        SELECT {column}::float8
        FROM reddit_posts
        WHERE (LOWER(data->>'subreddit') = $1 OR LOWER(data->>'subreddit_name_prefixed') = $2)
          AND created_at BETWEEN $3 AND $4 AND {column} IS NOT NULL
        ORDER BY random()
        LIMIT $5
        "#
    ))
    .bind(subreddit)
    .bind(&prefixed)
    .bind(range.start)
    .bind(range.end)
    .bind(DISTRIBUTION_SAMPLE)
    .fetch_all(&mut *conn)
    .await?;

    Ok((average, distribution))
}
