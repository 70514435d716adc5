//! Toxicity comparison endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::http::error::ApiError;
use crate::http::extractors::ValidQuery;
use crate::http::params::comma_list;
use crate::http::server::AppState;
use crate::models::{DateRange, Platform, ToxicityMetric, ValidationError};
use crate::panels::toxicity::{self, CommunityToxicity, ToxicityRequest};

/// `?communities=a,b&platforms=chan,reddit&metric&start&end`
#[derive(Debug, Default, Deserialize)]
pub struct ToxicityParams {
    pub communities: Option<String>,
    pub platforms: Option<String>,
    pub metric: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl ToxicityParams {
    /// Validate into a panel request. Platforms default to both.
    pub fn into_request(self) -> Result<ToxicityRequest, ValidationError> {
        let communities = comma_list(self.communities.as_deref());
        if communities.is_empty() {
            return Err(ValidationError::Empty { field: "communities" });
        }

        let mut platforms = Vec::new();
        for raw in comma_list(self.platforms.as_deref()) {
            let platform = Platform::parse(&raw)?;
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        if platforms.is_empty() {
            platforms = Platform::ALL.to_vec();
        }

        Ok(ToxicityRequest {
            platforms,
            communities,
            metric: ToxicityMetric::parse(self.metric.as_deref().unwrap_or_default())?,
            range: DateRange::resolve_now(self.start.as_deref(), self.end.as_deref()),
        })
    }
}

/// GET /api/toxicity/communities
async fn communities(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(toxicity::communities(&state.pool).await?))
}

/// GET /api/toxicity
async fn compare(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<ToxicityParams>,
) -> Result<Json<Vec<CommunityToxicity>>, ApiError> {
    let request = params.into_request()?;
    Ok(Json(toxicity::toxicity(&state.pool, request).await?))
}

/// Toxicity routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/toxicity", get(compare))
        .route("/api/toxicity/communities", get(communities))
}
