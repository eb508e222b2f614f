//! Per-frame sense → plan → act orchestration

use std::time::Instant;

use tracing::{debug, debug_span, error, info, info_span, warn, Span};

use crate::config::{PlanSafetyPolicy, RuntimeConfig};
use crate::control::{ControlCommand, Controller};
use crate::lane::LaneModel;
use crate::object::{BoundingBox, TrackedObject};
use crate::perception::{Detector, LaneEstimator, PerceptionFrame, StubDetector, StubLaneEstimator};
use crate::planning::{BehaviorPlanner, MotionPlan};
use crate::report::{FrameReport, SafetyState};
use crate::safety::SafetyMonitor;
use crate::telemetry::PerformanceMetrics;
use crate::tracking::Tracker;
use crate::AdasError;
use data_validator::Validator;

/// Externally callable control loop
pub trait ControlLoop {
    /// Process one frame at the given ego speed
    fn step(
        &mut self,
        frame: &PerceptionFrame,
        current_speed_mps: f64,
    ) -> Result<(MotionPlan, ControlCommand), AdasError>;

    /// Start a new session
    fn reset(&mut self);

    /// Diagnostics of the most recent successful step
    fn last_report(&self) -> Option<&FrameReport>;
}

/// Tracker → planner → safety → controller pipeline
pub struct AdasPipeline {
    detector: Box<dyn Detector>,
    lane_estimator: Box<dyn LaneEstimator>,
    tracker: Tracker,
    planner: BehaviorPlanner,
    controller: Controller,
    safety: SafetyMonitor,
    policy: PlanSafetyPolicy,

    /// Period passed to the steering-rate tracker (seconds)
    control_dt_s: f64,

    frame_count: u64,
    current_speed_mps: f64,
    safety_state: SafetyState,
    last_report: Option<FrameReport>,
    metrics: PerformanceMetrics,
    span: Span,
}

impl AdasPipeline {
    /// Build a pipeline around the given perception collaborators
    pub fn new(
        detector: Box<dyn Detector>,
        lane_estimator: Box<dyn LaneEstimator>,
        config: &RuntimeConfig,
    ) -> Result<Self, AdasError> {
        if config.fps == 0 {
            return Err(AdasError::Configuration("fps must be positive".to_string()));
        }

        let span = info_span!(
            "adas_pipeline",
            detector = detector.name(),
            lane_estimator = lane_estimator.name()
        );

        let pipeline = Self {
            tracker: Tracker::new(config.tracker.clone())?,
            planner: BehaviorPlanner::new(config.planner.clone())?,
            controller: Controller::new(config.controller.clone())?,
            safety: SafetyMonitor::new(config.safety.clone()),
            policy: config.plan_safety_policy,
            control_dt_s: 1.0 / config.fps as f64,
            detector,
            lane_estimator,
            frame_count: 0,
            current_speed_mps: 0.0,
            safety_state: SafetyState::Nominal,
            last_report: None,
            metrics: PerformanceMetrics::new(),
            span,
        };

        pipeline.span.in_scope(|| {
            info!(policy = ?pipeline.policy, "ADAS pipeline initialized");
        });
        Ok(pipeline)
    }

    /// Pipeline with the deterministic stub collaborators
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, AdasError> {
        Self::new(
            Box::new(StubDetector::new(&config.detector)),
            Box::new(StubLaneEstimator),
            config,
        )
    }

    /// Override the plan safety policy
    pub fn with_policy(mut self, policy: PlanSafetyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> PlanSafetyPolicy {
        self.policy
    }

    /// Frames stepped since construction or the last reset
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Ego speed of the most recent step
    pub fn current_speed_mps(&self) -> f64 {
        self.current_speed_mps
    }

    pub fn safety_state(&self) -> &SafetyState {
        &self.safety_state
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn safety_monitor(&self) -> &SafetyMonitor {
        &self.safety
    }

    fn perceive(&mut self, frame: &PerceptionFrame) -> (Vec<BoundingBox>, Option<LaneModel>) {
        let perceived = Validator::default()
            .validate_image_dimensions(frame.width, frame.height)
            .map_err(AdasError::from)
            .and_then(|()| self.detector.infer(frame))
            .and_then(|detections| Ok((detections, self.lane_estimator.estimate(frame)?)));

        match perceived {
            Ok(result) => result,
            Err(e) => {
                error!("Perception failed: {}", e);
                (Vec::new(), None)
            }
        }
    }

    /// Apply the safety policy to a freshly planned motion
    fn resolve_safety(
        &self,
        plan: MotionPlan,
        tracked: &[TrackedObject],
        current_speed_mps: f64,
    ) -> (MotionPlan, SafetyState) {
        let mut violations = self.safety.motion_plan_violations(&plan, current_speed_mps);

        let lead = tracked.iter().min_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        let too_close = match self.safety.check_following_distance(lead, current_speed_mps) {
            Ok(()) => false,
            Err(violation) => {
                violations.push(violation);
                true
            }
        };

        if violations.is_empty() {
            return (plan, SafetyState::Nominal);
        }
        for violation in &violations {
            warn!("Safety check: {}", violation);
        }

        match self.policy {
            PlanSafetyPolicy::Log => (plan, SafetyState::Warned { violations }),
            PlanSafetyPolicy::Clamp => {
                let mut clamped = self.safety.clamp_motion_plan(&plan, current_speed_mps);
                if too_close {
                    // Strongest braking the envelope permits, never above the speed limit
                    clamped.target_speed_mps = self
                        .safety
                        .max_deceleration_target(current_speed_mps)
                        .min(self.safety.limits().max_speed_mps);
                }
                debug!(
                    from = plan.target_speed_mps,
                    to = clamped.target_speed_mps,
                    "Motion plan clamped"
                );
                (clamped, SafetyState::Clamped { violations })
            }
            PlanSafetyPolicy::EmergencyStop => {
                (MotionPlan::emergency_stop(), SafetyState::EmergencyStop { violations })
            }
        }
    }

    fn run_step(
        &mut self,
        frame: &PerceptionFrame,
        current_speed_mps: f64,
        started: Instant,
    ) -> Result<(MotionPlan, ControlCommand), AdasError> {
        self.current_speed_mps = current_speed_mps;
        self.frame_count += 1;
        let warnings_before = self.safety.warning_count();

        debug!("Processing frame {} (count={})", frame.frame_id, self.frame_count);

        let (detections, lane) = self.perceive(frame);
        let tracked = self.tracker.update(&detections)?;

        let lane_center = lane.as_ref().map(|l| l.lane_center_px);
        let plan = self.planner.plan(frame.width, lane_center, &tracked)?;
        let (plan, safety_state) = self.resolve_safety(plan, &tracked, current_speed_mps);

        let raw = self.controller.to_command(&plan, current_speed_mps)?;
        let command = self.safety.sanitize_control_command(&raw);
        self.safety.check_control_command(&command, self.control_dt_s);

        let elapsed = started.elapsed();
        let violation_count = safety_state.violations().len() as u64;
        self.metrics
            .update_frame(elapsed, detections.len(), tracked.len(), lane.is_some());
        self.metrics
            .record_safety_warnings(self.safety.warning_count() - warnings_before);
        self.metrics.record_safety_violations(violation_count);

        metrics::counter!("adas_frames_total").increment(1);
        metrics::counter!("adas_safety_violations_total").increment(violation_count);
        metrics::histogram!("adas_step_seconds").record(elapsed.as_secs_f64());

        info!(
            "Frame {}: detections={}, tracks={}, lane={}, plan={}, cmd=t{:.2}/b{:.2}/s{:.2}",
            frame.frame_id,
            detections.len(),
            tracked.len(),
            if lane.is_some() { "yes" } else { "no" },
            plan.reason,
            command.throttle,
            command.brake,
            command.steering
        );

        self.safety_state = safety_state.clone();
        self.last_report = Some(FrameReport {
            frame_id: frame.frame_id,
            timestamp_s: frame.timestamp_s,
            current_speed_mps,
            detections,
            lane,
            tracked,
            plan: plan.clone(),
            command,
            safety_state,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        });

        Ok((plan, command))
    }
}

impl ControlLoop for AdasPipeline {
    fn step(
        &mut self,
        frame: &PerceptionFrame,
        current_speed_mps: f64,
    ) -> Result<(MotionPlan, ControlCommand), AdasError> {
        let step_span = debug_span!(parent: &self.span, "step", frame_id = frame.frame_id);
        let _guard = step_span.enter();

        self.run_step(frame, current_speed_mps, Instant::now())
            .map_err(|source| {
                error!("Pipeline step failed: {}", source);
                metrics::counter!("adas_step_errors_total").increment(1);
                AdasError::Pipeline {
                    frame_id: frame.frame_id,
                    source: Box::new(source),
                }
            })
    }

    fn reset(&mut self) {
        let _guard = self.span.enter();
        info!("Pipeline reset");

        self.tracker.reset();
        self.safety.reset();
        self.metrics.reset();
        self.frame_count = 0;
        self.current_speed_mps = 0.0;
        self.safety_state = SafetyState::Nominal;
        self.last_report = None;
    }

    fn last_report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::synthetic_frame;
    use crate::safety::SafetyViolation;
    use proptest::prelude::*;

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn infer(&mut self, _frame: &PerceptionFrame) -> Result<Vec<BoundingBox>, AdasError> {
            Err(AdasError::Perception("sensor offline".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct EmptyRoad;

    impl Detector for EmptyRoad {
        fn infer(&mut self, _frame: &PerceptionFrame) -> Result<Vec<BoundingBox>, AdasError> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "empty-road"
        }
    }

    fn stub_pipeline(policy: PlanSafetyPolicy) -> AdasPipeline {
        AdasPipeline::from_config(&RuntimeConfig::default())
            .unwrap()
            .with_policy(policy)
    }

    fn frame(id: u64) -> PerceptionFrame {
        synthetic_frame(id, 1280, 720)
    }

    #[test]
    fn test_clamp_policy_brakes_at_permitted_rate() {
        let mut pipeline = stub_pipeline(PlanSafetyPolicy::Clamp);
        let (plan, cmd) = pipeline.step(&frame(0), 10.0).unwrap();

        // Stub lead box is very close: following distance violated
        assert!((plan.target_speed_mps - 9.2).abs() < 1e-9);
        assert!((cmd.brake - 0.12).abs() < 1e-9);
        assert_eq!(cmd.throttle, 0.0);
        assert_eq!(cmd.steering, 0.0);

        let state = pipeline.safety_state();
        assert!(matches!(state, SafetyState::Clamped { .. }));
        assert!(state
            .violations()
            .iter()
            .any(|v| matches!(v, SafetyViolation::FollowingDistance { .. })));
    }

    #[test]
    fn test_clamp_policy_respects_speed_limit_when_too_close() {
        let mut pipeline = stub_pipeline(PlanSafetyPolicy::Clamp);
        let (plan, cmd) = pipeline.step(&frame(0), 40.0).unwrap();

        assert_eq!(plan.target_speed_mps, 33.0);
        assert!(cmd.brake > 0.0);
        assert_eq!(cmd.throttle, 0.0);
        assert!(!pipeline
            .safety_state()
            .violations()
            .iter()
            .any(|v| matches!(v, SafetyViolation::SpeedLimit { .. })));
    }

    #[test]
    fn test_log_policy_keeps_plan() {
        let mut pipeline = stub_pipeline(PlanSafetyPolicy::Log);
        let (plan, cmd) = pipeline.step(&frame(0), 10.0).unwrap();

        assert!(plan.target_speed_mps < 1.0);
        assert!(plan.reason.starts_with("follow_close_"));
        assert_eq!(cmd.brake, 1.0);
        assert!(matches!(pipeline.safety_state(), SafetyState::Warned { .. }));
    }

    #[test]
    fn test_emergency_stop_policy() {
        let mut pipeline = stub_pipeline(PlanSafetyPolicy::EmergencyStop);
        let (plan, cmd) = pipeline.step(&frame(0), 10.0).unwrap();

        assert_eq!(plan, MotionPlan::emergency_stop());
        assert_eq!(cmd.brake, 1.0);
        assert_eq!(cmd.throttle, 0.0);
    }

    #[test]
    fn test_empty_road_cruises() {
        let mut pipeline = AdasPipeline::new(
            Box::new(EmptyRoad),
            Box::new(StubLaneEstimator),
            &RuntimeConfig::default(),
        )
        .unwrap();

        let (plan, cmd) = pipeline.step(&frame(0), 15.0).unwrap();
        assert_eq!(plan.target_speed_mps, 15.0);
        assert!(plan.reason.starts_with("cruise|lane_center_err_"));
        assert_eq!(cmd, ControlCommand::default());
        assert!(pipeline.safety_state().is_nominal());
    }

    #[test]
    fn test_perception_failure_degrades_to_empty() {
        let mut pipeline = AdasPipeline::new(
            Box::new(FailingDetector),
            Box::new(StubLaneEstimator),
            &RuntimeConfig::default(),
        )
        .unwrap();

        let (plan, cmd) = pipeline.step(&frame(3), 10.0).unwrap();
        assert_eq!(plan.reason, "cruise|no_lane");
        assert!((cmd.throttle - 0.75).abs() < 1e-12);

        let report = pipeline.last_report().unwrap();
        assert_eq!(report.frame_id, 3);
        assert!(report.detections.is_empty());
        assert!(report.lane.is_none());
    }

    #[test]
    fn test_malformed_frame_skips_perception() {
        let mut pipeline = stub_pipeline(PlanSafetyPolicy::Clamp);
        let (plan, _) = pipeline.step(&synthetic_frame(4, 1280, 0), 10.0).unwrap();

        assert_eq!(plan.reason, "cruise|no_lane");
        let report = pipeline.last_report().unwrap();
        assert!(report.detections.is_empty());
        assert!(report.tracked.is_empty());
        assert!(pipeline.safety_state().is_nominal());
    }

    #[test]
    fn test_component_errors_are_wrapped() {
        let mut pipeline = stub_pipeline(PlanSafetyPolicy::Clamp);

        let err = pipeline.step(&synthetic_frame(7, 0, 720), 10.0).unwrap_err();
        match &err {
            AdasError::Pipeline { frame_id, .. } => assert_eq!(*frame_id, 7),
            other => panic!("expected pipeline error, got {:?}", other),
        }
        assert!(matches!(err.root(), AdasError::Planning(_)));

        let err = pipeline.step(&frame(8), -1.0).unwrap_err();
        assert!(matches!(err.root(), AdasError::Control(_)));
    }

    #[test]
    fn test_track_identity_across_steps() {
        let mut pipeline = stub_pipeline(PlanSafetyPolicy::Clamp);
        for id in 0..3 {
            pipeline.step(&frame(id), 10.0).unwrap();
        }

        let report = pipeline.last_report().unwrap();
        assert_eq!(report.tracked.len(), 1);
        assert_eq!(report.tracked[0].track_id, 1);
        assert_eq!(pipeline.frame_count(), 3);
        assert_eq!(pipeline.metrics().total_frames, 3);
        assert_eq!(pipeline.metrics().frames_with_lane, 3);
    }

    #[test]
    fn test_reset_starts_new_session() {
        let mut pipeline = stub_pipeline(PlanSafetyPolicy::Clamp);
        pipeline.step(&frame(0), 10.0).unwrap();
        pipeline.reset();

        assert_eq!(pipeline.frame_count(), 0);
        assert_eq!(pipeline.current_speed_mps(), 0.0);
        assert_eq!(pipeline.tracker().track_count(), 0);
        assert!(pipeline.last_report().is_none());
        assert!(pipeline.safety_state().is_nominal());
        assert_eq!(pipeline.metrics().total_frames, 0);

        pipeline.step(&frame(1), 10.0).unwrap();
        assert_eq!(pipeline.last_report().unwrap().tracked[0].track_id, 1);
        assert_eq!(pipeline.metrics().total_frames, 1);
    }

    #[test]
    fn test_zero_fps_rejected() {
        let config = RuntimeConfig {
            fps: 0,
            ..Default::default()
        };
        assert!(matches!(
            AdasPipeline::from_config(&config),
            Err(AdasError::Configuration(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_clamped_plan_within_speed_limit(speed in 0.0f64..120.0, empty_road in any::<bool>()) {
            let mut pipeline = if empty_road {
                AdasPipeline::new(Box::new(EmptyRoad), Box::new(StubLaneEstimator), &RuntimeConfig::default())
                    .unwrap()
            } else {
                stub_pipeline(PlanSafetyPolicy::Clamp)
            };

            let (plan, _) = pipeline.step(&frame(0), speed).unwrap();
            let limit = pipeline.safety_monitor().limits().max_speed_mps;
            prop_assert!(plan.target_speed_mps <= limit);
            let speed_limit_violated = matches!(
                pipeline.safety_monitor().check_motion_plan(&plan, speed),
                Err(SafetyViolation::SpeedLimit { .. })
            );
            prop_assert!(!speed_limit_violated);
        }
    }
}
