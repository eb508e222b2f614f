//! Lane geometry

use serde::{Deserialize, Serialize};

/// Lane estimate for a single frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneModel {
    /// Left boundary polynomial `a*y² + b*y + c` in image coordinates
    pub left_coeffs: [f64; 3],

    /// Right boundary polynomial
    pub right_coeffs: [f64; 3],

    /// Lane center at the reference row (pixels)
    pub lane_center_px: f64,

    /// Radius of curvature (meters)
    pub curvature_m: f64,
}
