//! AI topic endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::http::error::ApiError;
use crate::http::extractors::ValidQuery;
use crate::http::params::comma_list;
use crate::http::server::AppState;
use crate::models::{Bucket, DateRange, PlatformFilter};
use crate::panels::topics::{self, TopicActivity, TopicSummaryRow, TopicToxicity, DEFAULT_TOPICS};

/// `?topics=a,b&platform&bucket&start&end`
#[derive(Debug, Default, Deserialize)]
pub struct TopicParams {
    pub topics: Option<String>,
    pub platform: Option<String>,
    pub bucket: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Series plus the derived tables for one request
#[derive(Debug, Serialize)]
pub struct TopicsResponse {
    pub topics: Vec<TopicActivity>,
    pub summary: Vec<TopicSummaryRow>,
    pub toxicity: Vec<TopicToxicity>,
}

/// GET /api/topics
async fn topic_report(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<TopicParams>,
) -> Result<Json<TopicsResponse>, ApiError> {
    let mut names = comma_list(params.topics.as_deref());
    if names.is_empty() {
        names = DEFAULT_TOPICS.map(str::to_owned).to_vec();
    }
    let platform = PlatformFilter::parse(params.platform.as_deref().unwrap_or_default())?;
    let bucket = Bucket::parse(params.bucket.as_deref().unwrap_or_default())?;
    let range = DateRange::resolve_now(params.start.as_deref(), params.end.as_deref());

    let activity = topics::topic_activity(&state.pool, &names, platform, bucket, range).await?;

    Ok(Json(TopicsResponse {
        summary: topics::summary_table(&activity),
        toxicity: topics::topic_toxicity(&activity),
        topics: activity,
    }))
}

/// Topic routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/topics", get(topic_report))
}
