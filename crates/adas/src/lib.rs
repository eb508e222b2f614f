//! Advanced Driver Assistance System (ADAS)
//!
//! Per-frame sense → plan → act control loop:
//! - Multi-object tracking with persistent identities
//! - Behavior planning (adaptive cruise and lane centering)
//! - Proportional control synthesis
//! - Safety envelope enforcement
//!
//! Perception (object detection, lane estimation) is supplied by the
//! integrator through the [`Detector`] and [`LaneEstimator`] traits.

pub mod config;
pub mod control;
pub mod lane;
pub mod object;
pub mod perception;
pub mod pipeline;
pub mod planning;
pub mod report;
pub mod runner;
pub mod safety;
pub mod telemetry;
pub mod tracking;

pub use crate::config::{
    parse_log_level, ControllerConfig, DetectorConfig, PlanSafetyPolicy, PlannerConfig,
    RuntimeConfig, SafetyLimits, TrackerConfig,
};
pub use control::{ControlCommand, Controller};
pub use lane::LaneModel;
pub use object::{BoundingBox, TrackedObject};
pub use perception::{
    synthetic_frame, Detector, LaneEstimator, PerceptionFrame, StubDetector, StubLaneEstimator,
};
pub use pipeline::{AdasPipeline, ControlLoop};
pub use planning::{BehaviorPlanner, MotionPlan};
pub use report::{FrameReport, SafetyState};
pub use runner::{PipelineRunner, RunSummary};
pub use safety::{SafetyMonitor, SafetyViolation};
pub use telemetry::{MetricsSummary, PerformanceMetrics};
pub use tracking::Tracker;

pub use data_validator::ValidationError;

use thiserror::Error;

/// ADAS error types
#[derive(Error, Debug)]
pub enum AdasError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Tracking failed: {0}")]
    Tracking(String),

    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Control failed: {0}")]
    Control(String),

    #[error("Safety violation: {0}")]
    Safety(#[from] SafetyViolation),

    #[error("Perception failed: {0}")]
    Perception(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Pipeline step failed on frame {frame_id}: {source}")]
    Pipeline {
        frame_id: u64,
        #[source]
        source: Box<AdasError>,
    },
}

impl AdasError {
    /// The component-level error, looking through the pipeline wrapper
    pub fn root(&self) -> &AdasError {
        match self {
            AdasError::Pipeline { source, .. } => source.root(),
            other => other,
        }
    }
}
