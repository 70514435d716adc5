//! Request-level domain types
//!
//! Parsed once at the edge. Invalid enum input returns ValidationError;
//! malformed dates fall back to defaults.

pub mod platform;
pub mod range;
pub mod validation;

pub use platform::{Bucket, Platform, PlatformFilter, ToxicityMetric};
pub use range::{parse_timestamp, DateRange, DEFAULT_WINDOW_DAYS};
pub use validation::ValidationError;
