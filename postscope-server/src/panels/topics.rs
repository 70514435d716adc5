//! AI topic frequency and toxicity
//!
//! A post mentions a topic when its text contains the topic name,
//! case-insensitively. Reddit posts are checked across body, title and
//! selftext.

use chrono::{DateTime, Utc};
use postscope_db::DbError;
use serde::Serialize;
use sqlx::{FromRow, PgConnection};

use super::stats::{self, round4};
use super::DbPool;
use crate::models::{Bucket, DateRange, Platform, PlatformFilter};

pub const DEFAULT_TOPICS: [&str; 4] = ["ChatGPT", "Claude", "Gemini", "LLaMA"];

const REDDIT_MATCH: &str =
    "(data->>'body' ILIKE $1 OR data->>'title' ILIKE $1 OR data->>'selftext' ILIKE $1)";

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct TopicPoint {
    pub t: DateTime<Utc>,
    pub count: i64,
    /// `None` when no post in the bucket was scored
    pub avg_toxicity: Option<f64>,
}

/// Series and raw scores for one topic
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopicActivity {
    pub topic: String,
    pub chan: Vec<TopicPoint>,
    pub reddit: Vec<TopicPoint>,
    #[serde(skip)]
    pub chan_toxicity: Vec<f64>,
    #[serde(skip)]
    pub reddit_toxicity: Vec<f64>,
}

impl TopicActivity {
    fn series(&self) -> [(Platform, &[TopicPoint]); 2] {
        [
            (Platform::Chan, self.chan.as_slice()),
            (Platform::Reddit, self.reddit.as_slice()),
        ]
    }

    fn raw_scores(&self) -> [(Platform, &[f64]); 2] {
        [
            (Platform::Chan, self.chan_toxicity.as_slice()),
            (Platform::Reddit, self.reddit_toxicity.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicSummaryRow {
    pub topic: String,
    pub platform: Platform,
    pub total_posts: i64,
    pub average_toxicity: Option<f64>,
    pub max_toxicity: Option<f64>,
    pub median_toxicity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicToxicity {
    pub topic: String,
    pub platform: Platform,
    pub toxicity: f64,
}

/// Escape LIKE wildcards and wrap the topic for a substring match.
pub fn like_pattern(topic: &str) -> String {
    let mut pattern = String::with_capacity(topic.len() + 2);
    pattern.push('%');
    for ch in topic.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Bucketed mentions and scores per topic. Each topic uses its own handle.
pub async fn topic_activity(
    pool: &DbPool,
    topics: &[String],
    platform: PlatformFilter,
    bucket: Bucket,
    range: DateRange,
) -> Result<Vec<TopicActivity>, DbError> {
    let mut results = Vec::with_capacity(topics.len());
    for topic in topics {
        let topic = topic.clone();
        let activity = pool
            .with_handle(pool.default_options(), move |handle| {
                Box::pin(async move {
                    let conn = handle.cursor();
                    let pattern = like_pattern(&topic);
                    let mut activity = TopicActivity {
                        topic,
                        ..TopicActivity::default()
                    };
                    if platform.includes(Platform::Chan) {
                        let filter = "content ILIKE $1";
                        activity.chan = topic_points(conn, "chan_posts", filter, &pattern, bucket, range).await?;
                        activity.chan_toxicity = topic_scores(conn, "chan_posts", filter, &pattern, range).await?;
                    }
                    if platform.includes(Platform::Reddit) {
                        activity.reddit = topic_points(conn, "reddit_posts", REDDIT_MATCH, &pattern, bucket, range).await?;
                        activity.reddit_toxicity =
                            topic_scores(conn, "reddit_posts", REDDIT_MATCH, &pattern, range).await?;
                    }
                    Ok::<_, DbError>(activity)
                })
            })
            .await?;
        results.push(activity);
    }
    Ok(results)
}

async fn topic_points(
    conn: &mut PgConnection,
    table: &str,
    filter: &str,
    pattern: &str,
    bucket: Bucket,
    range: DateRange,
) -> Result<Vec<TopicPoint>, DbError> {
    let sql = format!(
        r#"
        SELECT date_trunc('{bucket}', created_at) AS t,
               COUNT(*) AS count,
               AVG(toxicityscore)::float8 AS avg_toxicity
        FROM {table}
        WHERE {filter} AND created_at BETWEEN $2 AND $3
        GROUP BY 1
        ORDER BY 1
        "#,
        bucket = bucket.as_str()
    );
    Ok(sqlx::query_as(&sql)
        .bind(pattern)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(conn)
        .await?)
}

async fn topic_scores(
    conn: &mut PgConnection,
    table: &str,
    filter: &str,
    pattern: &str,
    range: DateRange,
) -> Result<Vec<f64>, DbError> {
    let sql = format!(
        r#"
        SELECT toxicityscore::float8
        FROM {table}
        WHERE {filter} AND created_at BETWEEN $2 AND $3 AND toxicityscore IS NOT NULL
        "#
    );
    Ok(sqlx::query_scalar(&sql)
        .bind(pattern)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(conn)
        .await?)
}

/// Totals and bucket-average statistics per (topic, platform) with data.
pub fn summary_table(activity: &[TopicActivity]) -> Vec<TopicSummaryRow> {
    activity
        .iter()
        .flat_map(|topic| {
            topic
                .series()
                .into_iter()
                .filter(|(_, points)| !points.is_empty())
                .map(move |(platform, points)| {
                    let averages: Vec<f64> = points.iter().filter_map(|p| p.avg_toxicity).collect();
                    TopicSummaryRow {
                        topic: topic.topic.clone(),
                        platform,
                        total_posts: points.iter().map(|p| p.count).sum(),
                        average_toxicity: stats::mean(&averages).map(round4),
                        max_toxicity: stats::max(&averages).map(round4),
                        median_toxicity: stats::median(&averages).map(round4),
                    }
                })
        })
        .collect()
}

/// Mean raw toxicity per (topic, platform) that has scored posts.
pub fn topic_toxicity(activity: &[TopicActivity]) -> Vec<TopicToxicity> {
    activity
        .iter()
        .flat_map(|topic| {
            topic.raw_scores().into_iter().filter_map(move |(platform, scores)| {
                stats::mean(scores).map(|toxicity| TopicToxicity {
                    topic: topic.topic.clone(),
                    platform,
                    toxicity,
                })
            })
        })
        .collect()
}
