//! Temporal panel endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};

use crate::http::error::ApiError;
use crate::http::extractors::ValidQuery;
use crate::http::params::PanelParams;
use crate::http::server::AppState;
use crate::panels::temporal::{
    self, ActivityReport, AuthorCount, AuthorHours, AuthorLength, LengthPoint, PlatformTotal, WeekdayCount,
};
use crate::panels::{PlatformSeries, PlatformTable};

const DEFAULT_AUTHOR_LIMIT: i64 = 20;
const DEFAULT_TOP_AUTHORS: i64 = 10;

/// GET /api/temporal/activity
async fn activity(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<PanelParams>,
) -> Result<Json<ActivityReport>, ApiError> {
    let bucket = params.bucket()?;
    let report = temporal::posts_per_bucket(&state.pool, bucket, params.range()).await?;
    Ok(Json(report))
}

/// GET /api/temporal/summary
async fn summary(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<PanelParams>,
) -> Result<Json<Vec<PlatformTotal>>, ApiError> {
    Ok(Json(temporal::summary(&state.pool, params.range()).await?))
}

/// GET /api/temporal/weekday
async fn weekday(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<PanelParams>,
) -> Result<Json<Vec<WeekdayCount>>, ApiError> {
    Ok(Json(temporal::weekday_activity(&state.pool, params.range()).await?))
}

/// GET /api/temporal/length
async fn length(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<PanelParams>,
) -> Result<Json<Vec<PlatformSeries<LengthPoint>>>, ApiError> {
    Ok(Json(temporal::post_length_over_time(&state.pool, params.range()).await?))
}

/// GET /api/temporal/authors?limit
async fn authors(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<PanelParams>,
) -> Result<Json<Vec<PlatformTable<AuthorCount>>>, ApiError> {
    let limit = params.limit(DEFAULT_AUTHOR_LIMIT)?;
    Ok(Json(temporal::top_authors(&state.pool, params.range(), limit).await?))
}

/// GET /api/temporal/authors/hours?top
async fn author_hours(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<PanelParams>,
) -> Result<Json<Vec<PlatformTable<AuthorHours>>>, ApiError> {
    let top = params.limit(DEFAULT_TOP_AUTHORS)?;
    // limit() guarantees 1..=100
    let top = usize::try_from(top).unwrap_or(DEFAULT_TOP_AUTHORS as usize);
    Ok(Json(temporal::author_hour_pattern(&state.pool, params.range(), top).await?))
}

/// GET /api/temporal/authors/length?limit
async fn author_length(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<PanelParams>,
) -> Result<Json<Vec<PlatformTable<AuthorLength>>>, ApiError> {
    let limit = params.limit(DEFAULT_AUTHOR_LIMIT)?;
    Ok(Json(temporal::avg_length_by_author(&state.pool, params.range(), limit).await?))
}

/// Temporal routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/temporal/activity", get(activity))
        .route("/api/temporal/summary", get(summary))
        .route("/api/temporal/weekday", get(weekday))
        .route("/api/temporal/length", get(length))
        .route("/api/temporal/authors", get(authors))
        .route("/api/temporal/authors/hours", get(author_hours))
        .route("/api/temporal/authors/length", get(author_length))
}
