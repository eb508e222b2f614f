//! Recording Layer
//!
//! Captures per-frame pipeline inputs and decisions for offline analysis,
//! and replays them through a fresh pipeline.

mod recorder;
mod replay;

pub use recorder::{FrameRecord, Recorder, Recording, RecordingConfig, RecordingPipeline, RecordingStats};
pub use replay::{replay_frames, ReplayDetector, ReplayLaneEstimator};

use thiserror::Error;

/// Recorder errors
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
