//! Range and sanity checks for perception, planning and actuator values

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Detection confidence valid range
    pub confidence_range: (f64, f64),
    /// Largest accepted image side (pixels)
    pub max_image_dimension_px: u32,
    /// Normalized throttle valid range
    pub throttle_range: (f64, f64),
    /// Normalized brake valid range
    pub brake_range: (f64, f64),
    /// Normalized steering valid range
    pub steering_range: (f64, f64),
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            confidence_range: (0.0, 1.0),
            max_image_dimension_px: 10_000,
            throttle_range: (0.0, 1.0),
            brake_range: (0.0, 1.0),
            steering_range: (-1.0, 1.0),
        }
    }
}

/// Field validator shared by the ADAS data types
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Access the active configuration
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a single value against an inclusive range.
    ///
    /// NaN never lies inside a range and is rejected.
    pub fn validate_range(
        &self,
        field: &'static str,
        value: f64,
        range: (f64, f64),
    ) -> Result<(), ValidationError> {
        if value >= range.0 && value <= range.1 {
            Ok(())
        } else {
            Err(ValidationError::OutOfRange {
                field,
                value,
                min: range.0,
                max: range.1,
            })
        }
    }

    /// Reject NaN and infinities
    pub fn validate_finite(&self, field: &'static str, value: f64) -> Result<(), ValidationError> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(ValidationError::NonFinite { field, value })
        }
    }

    /// Finite and `>= 0`
    pub fn validate_non_negative(
        &self,
        field: &'static str,
        value: f64,
    ) -> Result<(), ValidationError> {
        self.validate_finite(field, value)?;
        if value < 0.0 {
            return Err(ValidationError::Negative { field, value });
        }
        Ok(())
    }

    /// Finite and `> 0`
    pub fn validate_positive(&self, field: &'static str, value: f64) -> Result<(), ValidationError> {
        self.validate_finite(field, value)?;
        if value <= 0.0 {
            return Err(ValidationError::NotPositive { field, value });
        }
        Ok(())
    }

    /// Require `upper > lower`
    pub fn validate_ordered(
        &self,
        lower_field: &'static str,
        lower: f64,
        upper_field: &'static str,
        upper: f64,
    ) -> Result<(), ValidationError> {
        if upper > lower {
            Ok(())
        } else {
            Err(ValidationError::NotOrdered {
                lower_field,
                lower,
                upper_field,
                upper,
            })
        }
    }

    /// Validate detection confidence
    pub fn validate_confidence(&self, confidence: f64) -> Result<(), ValidationError> {
        self.validate_range("confidence", confidence, self.config.confidence_range)
    }

    /// Validate normalized throttle
    pub fn validate_throttle(&self, throttle: f64) -> Result<(), ValidationError> {
        self.validate_range("throttle", throttle, self.config.throttle_range)
    }

    /// Validate normalized brake
    pub fn validate_brake(&self, brake: f64) -> Result<(), ValidationError> {
        self.validate_range("brake", brake, self.config.brake_range)
    }

    /// Validate normalized steering
    pub fn validate_steering(&self, steering: f64) -> Result<(), ValidationError> {
        self.validate_range("steering", steering, self.config.steering_range)
    }

    /// Validate image dimensions
    pub fn validate_image_dimensions(&self, width: u32, height: u32) -> Result<(), ValidationError> {
        let max = self.config.max_image_dimension_px;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(ValidationError::InvalidDimensions { width, height });
        }
        Ok(())
    }

    /// Validate a numeric configuration value with optional bounds
    pub fn validate_config_value(
        &self,
        name: &'static str,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<(), ValidationError> {
        self.validate_finite(name, value)?;
        let range = (min.unwrap_or(f64::NEG_INFINITY), max.unwrap_or(f64::INFINITY));
        self.validate_range(name, value, range)
    }
}
