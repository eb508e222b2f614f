//! Replay of recorded perception

use std::collections::HashMap;

use adas::{AdasError, BoundingBox, Detector, LaneEstimator, LaneModel, PerceptionFrame};
use tracing::debug;

use crate::recorder::FrameRecord;

/// Serves recorded detections by frame id
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    detections: HashMap<u64, Vec<BoundingBox>>,
}

impl ReplayDetector {
    pub fn new<'a>(records: impl IntoIterator<Item = &'a FrameRecord>) -> Self {
        let detections = records
            .into_iter()
            .filter_map(|r| r.detections.clone().map(|d| (r.frame_id, d)))
            .collect();
        Self { detections }
    }
}

impl Detector for ReplayDetector {
    fn infer(&mut self, frame: &PerceptionFrame) -> Result<Vec<BoundingBox>, AdasError> {
        match self.detections.get(&frame.frame_id) {
            Some(detections) => Ok(detections.clone()),
            None => {
                debug!(frame_id = frame.frame_id, "No recorded detections");
                Ok(Vec::new())
            }
        }
    }

    fn name(&self) -> &str {
        "replay-detector"
    }
}

/// Serves recorded lane estimates by frame id
#[derive(Debug, Clone, Default)]
pub struct ReplayLaneEstimator {
    lanes: HashMap<u64, LaneModel>,
}

impl ReplayLaneEstimator {
    pub fn new<'a>(records: impl IntoIterator<Item = &'a FrameRecord>) -> Self {
        let lanes = records
            .into_iter()
            .filter_map(|r| r.lane.clone().map(|l| (r.frame_id, l)))
            .collect();
        Self { lanes }
    }
}

impl LaneEstimator for ReplayLaneEstimator {
    fn estimate(&mut self, frame: &PerceptionFrame) -> Result<Option<LaneModel>, AdasError> {
        Ok(self.lanes.get(&frame.frame_id).cloned())
    }

    fn name(&self) -> &str {
        "replay-lane"
    }
}

/// Frames and ego speeds to feed back through a control loop
pub fn replay_frames<'a>(records: impl IntoIterator<Item = &'a FrameRecord>) -> Vec<(PerceptionFrame, f64)> {
    records
        .into_iter()
        .map(|r| {
            let frame = PerceptionFrame {
                frame_id: r.frame_id,
                timestamp_s: r.timestamp_s,
                width: r.width,
                height: r.height,
                pixels: Vec::new(),
            };
            (frame, r.current_speed_mps)
        })
        .collect()
}
