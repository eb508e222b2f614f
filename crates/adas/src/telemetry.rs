//! Pipeline performance accounting

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Running totals kept by the pipeline
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    pub total_frames: u64,
    pub total_detections: u64,
    pub total_tracks: u64,
    pub frames_with_lane: u64,
    pub safety_warnings: u64,
    pub safety_violations: u64,

    total_processing: Duration,
    min_frame_time: Option<Duration>,
    max_frame_time: Duration,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one processed frame
    pub fn update_frame(&mut self, frame_time: Duration, detections: usize, tracks: usize, has_lane: bool) {
        self.total_frames += 1;
        self.total_detections += detections as u64;
        self.total_tracks += tracks as u64;
        if has_lane {
            self.frames_with_lane += 1;
        }

        self.total_processing += frame_time;
        self.min_frame_time = Some(self.min_frame_time.map_or(frame_time, |min| min.min(frame_time)));
        self.max_frame_time = self.max_frame_time.max(frame_time);
    }

    pub fn record_safety_warnings(&mut self, count: u64) {
        self.safety_warnings += count;
    }

    pub fn record_safety_violations(&mut self, count: u64) {
        self.safety_violations += count;
    }

    pub fn avg_frame_time(&self) -> Duration {
        match u32::try_from(self.total_frames) {
            Ok(0) => Duration::ZERO,
            Ok(frames) => self.total_processing / frames,
            Err(_) => Duration::from_secs_f64(self.total_processing.as_secs_f64() / self.total_frames as f64),
        }
    }

    /// Processing throughput, ignoring pacing sleeps
    pub fn avg_fps(&self) -> f64 {
        let secs = self.total_processing.as_secs_f64();
        if secs > 0.0 {
            self.total_frames as f64 / secs
        } else {
            0.0
        }
    }

    /// Percentage of frames with a lane estimate
    pub fn lane_detection_rate(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.frames_with_lane as f64 / self.total_frames as f64 * 100.0
    }

    pub fn summary(&self) -> MetricsSummary {
        let per_frame = |total: u64| total as f64 / self.total_frames.max(1) as f64;

        MetricsSummary {
            total_frames: self.total_frames,
            avg_detections_per_frame: per_frame(self.total_detections),
            avg_tracks_per_frame: per_frame(self.total_tracks),
            lane_detection_rate: self.lane_detection_rate(),
            avg_fps: self.avg_fps(),
            avg_frame_ms: self.avg_frame_time().as_secs_f64() * 1000.0,
            min_frame_ms: self.min_frame_time.unwrap_or_default().as_secs_f64() * 1000.0,
            max_frame_ms: self.max_frame_time.as_secs_f64() * 1000.0,
            safety_warnings: self.safety_warnings,
            safety_violations: self.safety_violations,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Snapshot suitable for logging or export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub avg_detections_per_frame: f64,
    pub avg_tracks_per_frame: f64,

    /// Percent
    pub lane_detection_rate: f64,
    pub avg_fps: f64,
    pub avg_frame_ms: f64,
    pub min_frame_ms: f64,
    pub max_frame_ms: f64,
    pub safety_warnings: u64,
    pub safety_violations: u64,
}
