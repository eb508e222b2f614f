//! Per-frame diagnostics

use serde::{Deserialize, Serialize};

use crate::control::ControlCommand;
use crate::lane::LaneModel;
use crate::object::{BoundingBox, TrackedObject};
use crate::planning::MotionPlan;
use crate::safety::SafetyViolation;

/// How the safety checks resolved for a frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SafetyState {
    /// All checks passed
    #[default]
    Nominal,

    /// Violations were logged, plan used as produced
    Warned { violations: Vec<SafetyViolation> },

    /// Plan was clamped into the envelope
    Clamped { violations: Vec<SafetyViolation> },

    /// Plan was replaced by a full stop
    EmergencyStop { violations: Vec<SafetyViolation> },
}

impl SafetyState {
    pub fn is_nominal(&self) -> bool {
        matches!(self, SafetyState::Nominal)
    }

    /// Violations behind this state
    pub fn violations(&self) -> &[SafetyViolation] {
        match self {
            SafetyState::Nominal => &[],
            SafetyState::Warned { violations }
            | SafetyState::Clamped { violations }
            | SafetyState::EmergencyStop { violations } => violations,
        }
    }
}

/// Everything the pipeline saw and decided for one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame_id: u64,
    pub timestamp_s: f64,

    /// Ego speed the step was called with (m/s)
    pub current_speed_mps: f64,

    /// Raw detector output
    pub detections: Vec<BoundingBox>,
    pub lane: Option<LaneModel>,
    pub tracked: Vec<TrackedObject>,

    /// Plan after safety resolution
    pub plan: MotionPlan,

    /// Command after sanitization
    pub command: ControlCommand,
    pub safety_state: SafetyState,

    /// Wall time spent in the step (milliseconds)
    pub elapsed_ms: f64,
}
