//! Validation error types

use thiserror::Error;

/// Validation error for request parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Value outside the accepted range
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },

    /// Invalid enum variant
    #[error("invalid {field} value: '{value}'")]
    InvalidVariant { field: &'static str, value: String },

    /// Query string could not be decoded
    #[error("invalid query string: {reason}")]
    InvalidQuery { reason: String },
}

impl ValidationError {
    pub fn invalid_variant(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidVariant {
            field,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::invalid_variant("metric", "spiciness");
        assert_eq!(err.to_string(), "invalid metric value: 'spiciness'");

        let err = ValidationError::OutOfRange {
            field: "limit",
            min: 1,
            max: 100,
        };
        assert_eq!(err.to_string(), "limit must be between 1 and 100");
    }
}
