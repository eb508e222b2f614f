//! Perception collaborators
//!
//! Object detection and lane estimation are supplied by the integrator.
//! The stubs here are deterministic stand-ins for simulation and tests.

use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::lane::LaneModel;
use crate::object::BoundingBox;
use crate::AdasError;

/// Sensor frame handed to the perception collaborators
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerceptionFrame {
    /// Frame sequence number
    pub frame_id: u64,

    /// Capture timestamp (seconds)
    pub timestamp_s: f64,
    pub width: u32,
    pub height: u32,

    /// Raw RGB pixel data, may be empty for synthetic frames
    #[serde(skip)]
    pub pixels: Vec<u8>,
}

/// Object detector capability
pub trait Detector: Send {
    /// Detect objects in the frame. Must not block indefinitely.
    fn infer(&mut self, frame: &PerceptionFrame) -> Result<Vec<BoundingBox>, AdasError>;

    /// Detector name (for logging)
    fn name(&self) -> &str;
}

/// Lane estimation capability
pub trait LaneEstimator: Send {
    /// Estimate the ego lane, `None` when no lane is visible
    fn estimate(&mut self, frame: &PerceptionFrame) -> Result<Option<LaneModel>, AdasError>;

    /// Estimator name (for logging)
    fn name(&self) -> &str;
}

/// Deterministic detector: one lead-vehicle box in the ego lane
#[derive(Debug, Clone)]
pub struct StubDetector {
    confidence_threshold: f64,
}

impl StubDetector {
    /// Confidence the stub assigns to its box
    pub const CONFIDENCE: f64 = 0.8;

    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
        }
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new(&DetectorConfig::default())
    }
}

impl Detector for StubDetector {
    fn infer(&mut self, frame: &PerceptionFrame) -> Result<Vec<BoundingBox>, AdasError> {
        if Self::CONFIDENCE < self.confidence_threshold {
            return Ok(Vec::new());
        }

        let (width, height) = (frame.width as f64, frame.height as f64);
        let (box_w, box_h) = (width * 0.12, height * 0.18);
        let (center_x, bottom_y) = (width / 2.0, height * 0.7);

        Ok(vec![BoundingBox::new(
            center_x - box_w / 2.0,
            bottom_y - box_h,
            center_x + box_w / 2.0,
            bottom_y,
            Self::CONFIDENCE,
            "vehicle",
        )])
    }

    fn name(&self) -> &str {
        "stub-detector"
    }
}

/// Deterministic lane estimator: straight lane centered in the frame
#[derive(Debug, Clone, Default)]
pub struct StubLaneEstimator;

impl LaneEstimator for StubLaneEstimator {
    fn estimate(&mut self, frame: &PerceptionFrame) -> Result<Option<LaneModel>, AdasError> {
        let width = frame.width as f64;
        let left_base = width * 0.36;
        let right_base = width * 0.64;

        Ok(Some(LaneModel {
            left_coeffs: [0.0, 0.0, left_base],
            right_coeffs: [0.0, 0.0, right_base],
            lane_center_px: (left_base + right_base) / 2.0,
            curvature_m: 220.0,
        }))
    }

    fn name(&self) -> &str {
        "stub-lane"
    }
}

/// Synthetic frame with no pixel payload
pub fn synthetic_frame(frame_id: u64, width: u32, height: u32) -> PerceptionFrame {
    PerceptionFrame {
        frame_id,
        timestamp_s: frame_id as f64,
        width,
        height,
        pixels: Vec::new(),
    }
}
