//! Platforms, aggregation buckets, and toxicity metrics
//!
//! Every value here ends up inside SQL text, so each type only ever
//! renders from a fixed set of literals.

use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Source platform of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "4chan")]
    Chan,
    #[serde(rename = "Reddit")]
    Reddit,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Chan, Platform::Reddit];

    /// Author name that is noise rather than a person on this platform
    pub fn excluded_author(self) -> &'static str {
        match self {
            Self::Chan => "Anonymous",
            Self::Reddit => "AutoModerator",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "chan" | "4chan" => Ok(Self::Chan),
            "reddit" => Ok(Self::Reddit),
            _ => Err(ValidationError::invalid_variant("platform", raw)),
        }
    }
}

/// Which platforms a query should cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlatformFilter {
    Chan,
    Reddit,
    #[default]
    Both,
}

impl PlatformFilter {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "both" | "" => Ok(Self::Both),
            other => Platform::parse(other)
                .map(Self::from)
                .map_err(|_| ValidationError::invalid_variant("platform", raw)),
        }
    }

    pub fn includes(self, platform: Platform) -> bool {
        match self {
            Self::Both => true,
            Self::Chan => platform == Platform::Chan,
            Self::Reddit => platform == Platform::Reddit,
        }
    }
}

impl From<Platform> for PlatformFilter {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Chan => Self::Chan,
            Platform::Reddit => Self::Reddit,
        }
    }
}

/// Time bucket for `date_trunc`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    #[default]
    Day,
    Week,
}

impl Bucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "day" | "" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            _ => Err(ValidationError::invalid_variant("bucket", raw)),
        }
    }
}

/// Per-post score columns produced by the toxicity classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToxicityMetric {
    #[default]
    ToxicityScore,
    SevereToxicityScore,
    InsultScore,
    ProfanityScore,
    IdentityAttackScore,
    ThreatScore,
    UnsubstantialScore,
}

impl ToxicityMetric {
    pub const ALL: [ToxicityMetric; 7] = [
        Self::ToxicityScore,
        Self::SevereToxicityScore,
        Self::InsultScore,
        Self::ProfanityScore,
        Self::IdentityAttackScore,
        Self::ThreatScore,
        Self::UnsubstantialScore,
    ];

    /// Column name in both post tables
    pub fn column(self) -> &'static str {
        match self {
            Self::ToxicityScore => "toxicityscore",
            Self::SevereToxicityScore => "severetoxicityscore",
            Self::InsultScore => "insultscore",
            Self::ProfanityScore => "profanityscore",
            Self::IdentityAttackScore => "identityattackscore",
            Self::ThreatScore => "threatscore",
            Self::UnsubstantialScore => "unsubstantialscore",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let wanted = raw.trim().to_ascii_lowercase();
        if wanted.is_empty() {
            return Ok(Self::default());
        }
        Self::ALL
            .into_iter()
            .find(|metric| metric.column() == wanted)
            .ok_or_else(|| ValidationError::invalid_variant("metric", raw))
    }
}
