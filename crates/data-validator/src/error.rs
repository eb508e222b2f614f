//! Validation Error Types

use thiserror::Error;

/// Errors during data validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Value out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// NaN or infinite value
    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    /// Value below zero where only non-negative values are allowed
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    /// Value not strictly positive
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    /// Upper bound does not exceed lower bound (e.g. box corners)
    #[error("{upper_field}={upper} must exceed {lower_field}={lower}")]
    NotOrdered {
        lower_field: &'static str,
        lower: f64,
        upper_field: &'static str,
        upper: f64,
    },

    /// Image dimensions zero or too large
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

impl ValidationError {
    /// Name of the offending field, when the error is tied to one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::OutOfRange { field, .. }
            | ValidationError::NonFinite { field, .. }
            | ValidationError::Negative { field, .. }
            | ValidationError::NotPositive { field, .. } => Some(field),
            ValidationError::NotOrdered { upper_field, .. } => Some(upper_field),
            ValidationError::InvalidDimensions { .. } => None,
        }
    }
}
