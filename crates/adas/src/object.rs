//! Detected and tracked objects

use data_validator::{ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Axis-aligned detection box in image coordinates (pixels)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,

    /// Detection confidence in [0, 1]
    pub confidence: f64,

    /// Class label from the detector (e.g. "vehicle")
    pub label: String,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, confidence: f64, label: impl Into<String>) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            label: label.into(),
        }
    }

    /// Check the box invariants, reporting the first one violated
    pub fn validate(&self) -> Result<(), ValidationError> {
        let v = Validator::default();
        v.validate_non_negative("x1", self.x1)?;
        v.validate_non_negative("y1", self.y1)?;
        v.validate_finite("x2", self.x2)?;
        v.validate_finite("y2", self.y2)?;
        v.validate_ordered("x1", self.x1, "x2", self.x2)?;
        v.validate_ordered("y1", self.y1, "y2", self.y2)?;
        v.validate_confidence(self.confidence)
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Box center (x, y)
    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// Object with a persistent track identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub track_id: u64,

    /// Last associated detection
    pub bbox: BoundingBox,

    /// Relative velocity (m/s). Not estimated yet, always 0.
    pub velocity_mps: f64,

    /// Estimated range (meters)
    pub distance_m: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_box() {
        let b = BoundingBox::new(100.0, 100.0, 200.0, 235.0, 0.9, "car");
        assert!(b.validate().is_ok());
        assert_eq!(b.height(), 135.0);
        assert_eq!(b.center(), (150.0, 167.5));
    }

    #[test]
    fn test_negative_coordinates_rejected() {
        let err = BoundingBox::new(-1.0, 0.0, 10.0, 10.0, 0.5, "car").validate().unwrap_err();
        assert_eq!(err.field(), Some("x1"));
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn test_degenerate_width_rejected() {
        let err = BoundingBox::new(10.0, 0.0, 10.0, 10.0, 0.5, "car").validate().unwrap_err();
        assert_eq!(err.to_string(), "x2=10 must exceed x1=10");
    }

    #[test]
    fn test_inverted_height_rejected() {
        let err = BoundingBox::new(0.0, 20.0, 10.0, 10.0, 0.5, "car").validate().unwrap_err();
        assert_eq!(err.field(), Some("y2"));
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let err = BoundingBox::new(0.0, 0.0, 10.0, 10.0, 1.2, "car").validate().unwrap_err();
        assert_eq!(err.field(), Some("confidence"));
        assert!(BoundingBox::new(0.0, 0.0, 10.0, 10.0, f64::NAN, "car").validate().is_err());
    }

    #[test]
    fn test_infinite_corner_rejected() {
        let b = BoundingBox::new(0.0, 0.0, f64::INFINITY, 10.0, 0.5, "car");
        assert!(matches!(b.validate(), Err(ValidationError::NonFinite { field: "x2", .. })));
    }

    proptest! {
        #[test]
        fn prop_well_formed_boxes_accepted(
            x1 in 0.0f64..2000.0,
            y1 in 0.0f64..2000.0,
            w in 0.01f64..500.0,
            h in 0.01f64..500.0,
            confidence in 0.0f64..=1.0,
        ) {
            let b = BoundingBox::new(x1, y1, x1 + w, y1 + h, confidence, "vehicle");
            prop_assert!(b.validate().is_ok());
        }

        #[test]
        fn prop_non_positive_extent_rejected(
            x1 in 0.0f64..2000.0,
            y1 in 0.0f64..2000.0,
            shrink in 0.0f64..100.0,
        ) {
            let b = BoundingBox::new(x1, y1, x1 - shrink, y1 + 10.0, 0.5, "vehicle");
            prop_assert!(b.validate().is_err());
        }
    }
}
