//! Behavior planning: adaptive cruise and lane centering

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PlannerConfig;
use crate::object::TrackedObject;
use crate::AdasError;
use data_validator::{ValidationError, Validator};

/// Target speed and steering for the current frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionPlan {
    pub target_speed_mps: f64,
    pub steering_angle_deg: f64,

    /// `<speed_tag>|<steer_tag>` explaining the decision
    pub reason: String,
}

impl MotionPlan {
    /// Full stop with centered steering
    pub fn emergency_stop() -> Self {
        Self {
            target_speed_mps: 0.0,
            steering_angle_deg: 0.0,
            reason: "emergency_stop".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let v = Validator::default();
        v.validate_non_negative("target_speed_mps", self.target_speed_mps)?;
        v.validate_finite("steering_angle_deg", self.steering_angle_deg)
    }
}

/// Rule-based speed and steering planner
#[derive(Debug, Clone)]
pub struct BehaviorPlanner {
    config: PlannerConfig,
}

impl BehaviorPlanner {
    pub fn new(config: PlannerConfig) -> Result<Self, AdasError> {
        let v = Validator::default();
        v.validate_positive("cruise_speed_mps", config.cruise_speed_mps)?;
        v.validate_non_negative("min_follow_distance_m", config.min_follow_distance_m)?;
        v.validate_positive("max_steering_deg", config.max_steering_deg)?;
        v.validate_positive("time_gap_s", config.time_gap_s)?;
        v.validate_finite("lane_center_gain", config.lane_center_gain)?;
        Ok(Self { config })
    }

    /// Plan speed from the nearest object and steering from the lane center
    pub fn plan(
        &self,
        frame_width_px: u32,
        lane_center_px: Option<f64>,
        objects: &[TrackedObject],
    ) -> Result<MotionPlan, AdasError> {
        if frame_width_px == 0 {
            return Err(AdasError::Planning("Frame width must be positive".to_string()));
        }

        let nearest = objects
            .iter()
            .map(|o| o.distance_m)
            .min_by(|a, b| a.total_cmp(b));
        let (target_speed_mps, speed_tag) = self.target_speed(nearest);
        let (steering_angle_deg, steer_tag) = self.steering(frame_width_px as f64, lane_center_px);

        let plan = MotionPlan {
            target_speed_mps: target_speed_mps.max(0.0),
            steering_angle_deg,
            reason: format!("{}|{}", speed_tag, steer_tag),
        };
        plan.validate()
            .map_err(|e| AdasError::Planning(format!("Produced invalid plan: {}", e)))?;

        debug!(
            target = plan.target_speed_mps,
            steering = plan.steering_angle_deg,
            reason = %plan.reason,
            "Motion plan"
        );
        Ok(plan)
    }

    fn target_speed(&self, nearest: Option<f64>) -> (f64, String) {
        let cruise = self.config.cruise_speed_mps;
        let min_follow = self.config.min_follow_distance_m;
        let desired_gap = cruise * self.config.time_gap_s;

        let Some(d) = nearest else {
            return (cruise, "cruise".to_string());
        };
        if !d.is_finite() {
            return (cruise, "invalid_distance".to_string());
        }

        if d < min_follow {
            let ratio = (d / min_follow).clamp(0.0, 1.0);
            (cruise * ratio, format!("follow_close_{:.1}m", d))
        } else if d < desired_gap {
            (cruise * d / desired_gap, format!("follow_{:.1}m", d))
        } else {
            (cruise, format!("cruise_clear_{:.1}m", d))
        }
    }

    fn steering(&self, width: f64, lane_center_px: Option<f64>) -> (f64, String) {
        let Some(center) = lane_center_px else {
            return (0.0, "no_lane".to_string());
        };
        if !center.is_finite() || !(0.0..=width).contains(&center) {
            return (0.0, "invalid_lane".to_string());
        }

        let half = width / 2.0;
        let err = (center - half) / half;
        let deg = (self.config.lane_center_gain * err).clamp(-1.0, 1.0) * self.config.max_steering_deg;
        (deg, format!("lane_center_err_{:.3}", err))
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }
}
