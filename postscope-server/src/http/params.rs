//! Query-string parameters shared by the panel routes

use serde::Deserialize;

use crate::models::{Bucket, DateRange, ValidationError};

/// Largest accepted `limit`/`top`
pub const MAX_LIMIT: i64 = 100;

/// `?start&end&bucket&limit&top` - each route reads the fields it needs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PanelParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub bucket: Option<String>,
    pub limit: Option<i64>,
    pub top: Option<i64>,
}

impl PanelParams {
    /// Bad or missing dates fall back to the default window.
    pub fn range(&self) -> DateRange {
        DateRange::resolve_now(self.start.as_deref(), self.end.as_deref())
    }

    pub fn bucket(&self) -> Result<Bucket, ValidationError> {
        Bucket::parse(self.bucket.as_deref().unwrap_or_default())
    }

    /// `limit` (or `top`), defaulting to `default`, validated to 1..=100.
    pub fn limit(&self, default: i64) -> Result<i64, ValidationError> {
        let value = self.limit.or(self.top).unwrap_or(default);
        if (1..=MAX_LIMIT).contains(&value) {
            Ok(value)
        } else {
            Err(ValidationError::OutOfRange {
                field: "limit",
                min: 1,
                max: MAX_LIMIT,
            })
        }
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn comma_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}
