//! Recorder Implementation

use std::collections::VecDeque;
use std::path::Path;
use std::time::Instant;

use adas::{
    AdasError, BoundingBox, ControlCommand, ControlLoop, FrameReport, LaneModel, MotionPlan,
    PerceptionFrame, SafetyState,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::RecorderError;

/// What to capture
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub name: String,

    /// Oldest frames are dropped beyond this count
    pub max_frames: usize,
    pub record_detections: bool,
    pub record_plans: bool,
    pub record_commands: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            name: "adas_recording".to_string(),
            max_frames: 100_000, // ~80 minutes at 20 FPS
            record_detections: true,
            record_plans: true,
            record_commands: true,
        }
    }
}

/// One recorded frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_id: u64,
    pub timestamp_s: f64,
    pub width: u32,
    pub height: u32,
    pub current_speed_mps: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detections: Option<Vec<BoundingBox>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane: Option<LaneModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<MotionPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<ControlCommand>,

    #[serde(default)]
    pub safety_state: SafetyState,

    /// Wall time of the wrapped step (milliseconds)
    pub step_ms: f64,
}

impl FrameRecord {
    /// Build a record from a completed step
    ///
    /// Perception outputs and safety state come from the loop's report
    /// when it provides one.
    pub fn capture(
        config: &RecordingConfig,
        frame: &PerceptionFrame,
        current_speed_mps: f64,
        plan: &MotionPlan,
        command: &ControlCommand,
        report: Option<&FrameReport>,
        step_ms: f64,
    ) -> Self {
        let report = report.filter(|r| r.frame_id == frame.frame_id);

        Self {
            frame_id: frame.frame_id,
            timestamp_s: frame.timestamp_s,
            width: frame.width,
            height: frame.height,
            current_speed_mps,
            detections: report
                .filter(|_| config.record_detections)
                .map(|r| r.detections.clone()),
            lane: report.and_then(|r| r.lane.clone()),
            plan: config.record_plans.then(|| plan.clone()),
            command: config.record_commands.then_some(*command),
            safety_state: report.map(|r| r.safety_state.clone()).unwrap_or_default(),
            step_ms,
        }
    }
}

/// Serialized form of a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub config: RecordingConfig,
    pub frames: Vec<FrameRecord>,
}

/// Recording statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingStats {
    pub total_frames: usize,
    pub dropped_frames: u64,
    pub is_recording: bool,
    pub recording_time_s: f64,
}

/// In-memory frame recorder with bounded retention
pub struct Recorder {
    config: RecordingConfig,
    frames: VecDeque<FrameRecord>,
    dropped: u64,
    recording: bool,
    started_at: Option<Instant>,
}

impl Recorder {
    pub fn new(config: RecordingConfig) -> Self {
        info!("Recorder initialized: {}", config.name);
        Self {
            frames: VecDeque::with_capacity(config.max_frames.min(10_000)),
            config,
            dropped: 0,
            recording: false,
            started_at: None,
        }
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    pub fn start(&mut self) {
        self.recording = true;
        self.started_at = Some(Instant::now());
        info!("Recording started");
    }

    pub fn stop(&mut self) {
        self.recording = false;
        info!("Recording stopped. Captured {} frames", self.frames.len());
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Store a frame. Ignored while stopped.
    pub fn record(&mut self, record: FrameRecord) {
        if !self.recording {
            return;
        }

        // Enforce retention
        while self.frames.len() >= self.config.max_frames.max(1) {
            self.frames.pop_front();
            self.dropped += 1;
        }

        debug!(frame_id = record.frame_id, "Frame recorded");
        self.frames.push_back(record);
    }

    /// Recorded frames, oldest first
    pub fn frames(&self) -> impl Iterator<Item = &FrameRecord> {
        self.frames.iter()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn stats(&self) -> RecordingStats {
        RecordingStats {
            total_frames: self.frames.len(),
            dropped_frames: self.dropped,
            is_recording: self.recording,
            recording_time_s: self
                .started_at
                .map(|t| t.elapsed().as_secs_f64())
                .unwrap_or(0.0),
        }
    }

    /// Drop all frames
    pub fn clear(&mut self) {
        self.frames.clear();
        self.dropped = 0;
    }

    pub fn to_recording(&self) -> Recording {
        Recording {
            config: self.config.clone(),
            frames: self.frames.iter().cloned().collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, RecorderError> {
        Ok(serde_json::to_string_pretty(&self.to_recording())?)
    }

    /// Restore a stopped recorder from JSON
    pub fn from_json(json: &str) -> Result<Self, RecorderError> {
        let recording: Recording = serde_json::from_str(json)?;
        let mut recorder = Self::new(recording.config);
        recorder.frames = recording.frames.into();
        Ok(recorder)
    }

    pub fn save(&self, path: &Path) -> Result<(), RecorderError> {
        std::fs::write(path, self.to_json()?)?;
        info!("Recording saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, RecorderError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(RecordingConfig::default())
    }
}

/// Control loop wrapper that records every successful step
pub struct RecordingPipeline<L: ControlLoop> {
    inner: L,
    recorder: Recorder,
}

impl<L: ControlLoop> RecordingPipeline<L> {
    pub fn new(inner: L, recorder: Recorder) -> Self {
        Self { inner, recorder }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut L {
        &mut self.inner
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut Recorder {
        &mut self.recorder
    }

    pub fn into_parts(self) -> (L, Recorder) {
        (self.inner, self.recorder)
    }
}

impl<L: ControlLoop> ControlLoop for RecordingPipeline<L> {
    fn step(
        &mut self,
        frame: &PerceptionFrame,
        current_speed_mps: f64,
    ) -> Result<(MotionPlan, ControlCommand), AdasError> {
        let started = Instant::now();
        let (plan, command) = self.inner.step(frame, current_speed_mps)?;
        let step_ms = started.elapsed().as_secs_f64() * 1000.0;

        if self.recorder.is_recording() {
            let record = FrameRecord::capture(
                self.recorder.config(),
                frame,
                current_speed_mps,
                &plan,
                &command,
                self.inner.last_report(),
                step_ms,
            );
            self.recorder.record(record);
        }

        Ok((plan, command))
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn last_report(&self) -> Option<&FrameReport> {
        self.inner.last_report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adas::{synthetic_frame, AdasPipeline, RuntimeConfig};

    fn record(frame_id: u64) -> FrameRecord {
        FrameRecord {
            frame_id,
            timestamp_s: frame_id as f64,
            width: 1280,
            height: 720,
            current_speed_mps: 10.0,
            detections: None,
            lane: None,
            plan: None,
            command: None,
            safety_state: SafetyState::Nominal,
            step_ms: 1.0,
        }
    }

    fn recording_pipeline(config: RecordingConfig) -> RecordingPipeline<AdasPipeline> {
        let pipeline = AdasPipeline::from_config(&RuntimeConfig::default()).unwrap();
        let mut recorder = Recorder::new(config);
        recorder.start();
        RecordingPipeline::new(pipeline, recorder)
    }

    #[test]
    fn test_record_ignored_while_stopped() {
        let mut recorder = Recorder::default();
        recorder.record(record(0));
        assert_eq!(recorder.frame_count(), 0);

        recorder.start();
        recorder.record(record(1));
        recorder.stop();
        recorder.record(record(2));

        assert_eq!(recorder.frame_count(), 1);
        assert!(!recorder.stats().is_recording);
    }

    #[test]
    fn test_retention_limit() {
        let mut recorder = Recorder::new(RecordingConfig {
            max_frames: 5,
            ..Default::default()
        });
        recorder.start();
        for i in 0..10 {
            recorder.record(record(i));
        }

        let stats = recorder.stats();
        assert_eq!(stats.total_frames, 5);
        assert_eq!(stats.dropped_frames, 5);
        assert_eq!(recorder.frames().next().unwrap().frame_id, 5);
    }

    #[test]
    fn test_recording_pipeline_captures_reports() {
        let mut pipeline = recording_pipeline(RecordingConfig::default());
        for id in 0..3 {
            pipeline.step(&synthetic_frame(id, 1280, 720), 10.0).unwrap();
        }

        let recorder = pipeline.recorder();
        assert_eq!(recorder.frame_count(), 3);

        let first = recorder.frames().next().unwrap();
        assert_eq!(first.detections.as_ref().map(Vec::len), Some(1));
        assert!(first.lane.is_some());
        assert!(first.plan.is_some());
        assert!(matches!(first.safety_state, SafetyState::Clamped { .. }));
        assert_eq!(pipeline.last_report().unwrap().frame_id, 2);
    }

    #[test]
    fn test_capture_respects_config() {
        let mut pipeline = recording_pipeline(RecordingConfig {
            record_detections: false,
            record_commands: false,
            ..Default::default()
        });
        pipeline.step(&synthetic_frame(0, 1280, 720), 10.0).unwrap();

        let frame = pipeline.recorder().frames().next().unwrap();
        assert!(frame.detections.is_none());
        assert!(frame.command.is_none());
        assert!(frame.plan.is_some());
    }

    #[test]
    fn test_failed_step_not_recorded() {
        let mut pipeline = recording_pipeline(RecordingConfig::default());
        assert!(pipeline.step(&synthetic_frame(0, 0, 720), 10.0).is_err());
        assert_eq!(pipeline.recorder().frame_count(), 0);
    }

    #[test]
    fn test_reset_forwards_to_inner() {
        let mut pipeline = recording_pipeline(RecordingConfig::default());
        pipeline.step(&synthetic_frame(0, 1280, 720), 10.0).unwrap();
        pipeline.reset();

        assert_eq!(pipeline.inner().frame_count(), 0);
        assert!(pipeline.last_report().is_none());
        // Recorded history survives a pipeline reset
        assert_eq!(pipeline.recorder().frame_count(), 1);
    }

    #[test]
    fn test_json_restore() {
        let mut pipeline = recording_pipeline(RecordingConfig::default());
        for id in 0..2 {
            pipeline.step(&synthetic_frame(id, 1280, 720), 10.0).unwrap();
        }
        let (_, recorder) = pipeline.into_parts();

        let json = recorder.to_json().unwrap();
        let restored = Recorder::from_json(&json).unwrap();

        assert!(!restored.is_recording());
        assert_eq!(restored.frame_count(), 2);
        assert_eq!(
            restored.frames().collect::<Vec<_>>(),
            recorder.frames().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_save_and_load() {
        let mut recorder = Recorder::default();
        recorder.start();
        recorder.record(record(4));

        let path = std::env::temp_dir().join(format!("{}-adas-recording.json", std::process::id()));
        recorder.save(&path).unwrap();
        let loaded = Recorder::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.frames().next().unwrap().frame_id, 4);
    }

    #[test]
    fn test_from_invalid_json() {
        assert!(matches!(
            Recorder::from_json("not json"),
            Err(RecorderError::Serialization(_))
        ));
    }
}
