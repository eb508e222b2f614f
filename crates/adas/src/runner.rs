//! Paced execution of a control loop

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::perception::{synthetic_frame, PerceptionFrame};
use crate::pipeline::ControlLoop;
use crate::AdasError;

/// Synthetic run frame size
pub const SYNTHETIC_WIDTH: u32 = 1280;
pub const SYNTHETIC_HEIGHT: u32 = 720;

/// Ego speed at the start of a synthetic run (m/s)
pub const SYNTHETIC_START_SPEED_MPS: f64 = 10.0;

/// Speed change per second at full throttle or brake in the synthetic model
const SYNTHETIC_ACCEL_GAIN: f64 = 5.0;

/// Outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub frames_failed: u64,

    /// Ego speed after the last frame (synthetic runs only)
    pub final_speed_mps: f64,
    pub wall_time_s: f64,
}

/// Drives a control loop at a target frame rate
pub struct PipelineRunner<L: ControlLoop> {
    pipeline: L,
    target_fps: u32,
}

impl<L: ControlLoop> PipelineRunner<L> {
    pub fn new(pipeline: L, target_fps: u32) -> Result<Self, AdasError> {
        if target_fps == 0 {
            return Err(AdasError::Configuration("target fps must be positive".to_string()));
        }
        Ok(Self {
            pipeline,
            target_fps,
        })
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps as f64)
    }

    /// Run synthetic frames, integrating a toy longitudinal model
    pub fn run_synthetic(&mut self, max_frames: u64) -> RunSummary {
        info!(
            "Starting synthetic run: {} frames at {} FPS",
            max_frames, self.target_fps
        );

        let run_started = Instant::now();
        let period = self.frame_period();
        let dt = period.as_secs_f64();
        let mut speed_mps = SYNTHETIC_START_SPEED_MPS;
        let mut summary = RunSummary::default();

        for frame_id in 0..max_frames {
            let started = Instant::now();
            let frame = synthetic_frame(frame_id, SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT);

            match self.pipeline.step(&frame, speed_mps) {
                Ok((_, cmd)) => {
                    speed_mps = (speed_mps + (cmd.throttle - cmd.brake) * dt * SYNTHETIC_ACCEL_GAIN).max(0.0);
                    summary.frames_processed += 1;
                }
                Err(e) => {
                    error!("Pipeline failed on frame {}: {}", frame_id, e);
                    summary.frames_failed += 1;
                    continue;
                }
            }

            debug!(
                frame_id,
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                speed_mps,
                "Frame done"
            );
            pace(started, period);
        }

        summary.final_speed_mps = speed_mps;
        summary.wall_time_s = run_started.elapsed().as_secs_f64();
        info!(
            "Synthetic run completed: {} frames processed, {} failed",
            summary.frames_processed, summary.frames_failed
        );
        summary
    }

    /// Run caller-supplied frames with their ego speeds
    pub fn run_frames<I>(&mut self, frames: I) -> RunSummary
    where
        I: IntoIterator<Item = (PerceptionFrame, f64)>,
    {
        let run_started = Instant::now();
        let period = self.frame_period();
        let mut summary = RunSummary::default();

        for (frame, speed_mps) in frames {
            let started = Instant::now();
            match self.pipeline.step(&frame, speed_mps) {
                Ok(_) => summary.frames_processed += 1,
                Err(e) => {
                    error!("Pipeline failed on frame {}: {}", frame.frame_id, e);
                    summary.frames_failed += 1;
                    continue;
                }
            }
            summary.final_speed_mps = speed_mps;
            pace(started, period);
        }

        summary.wall_time_s = run_started.elapsed().as_secs_f64();
        summary
    }

    pub fn pipeline(&self) -> &L {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut L {
        &mut self.pipeline
    }

    pub fn into_pipeline(self) -> L {
        self.pipeline
    }
}

/// Sleep away whatever is left of the frame period
fn pace(started: Instant, period: Duration) {
    if let Some(remaining) = period.checked_sub(started.elapsed()) {
        thread::sleep(remaining);
    }
}
