//! Actuator command synthesis

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ControllerConfig;
use crate::planning::MotionPlan;
use crate::AdasError;
use data_validator::{ValidationError, Validator};

/// Normalized actuator command
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    /// [0, 1]
    pub throttle: f64,

    /// [0, 1]
    pub brake: f64,

    /// [-1, 1], positive steers right
    pub steering: f64,
}

impl ControlCommand {
    pub fn new(throttle: f64, brake: f64, steering: f64) -> Self {
        Self {
            throttle,
            brake,
            steering,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let v = Validator::default();
        v.validate_throttle(self.throttle)?;
        v.validate_brake(self.brake)?;
        v.validate_steering(self.steering)
    }
}

/// Stateless proportional controller
#[derive(Debug, Clone)]
pub struct Controller {
    config: ControllerConfig,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Result<Self, AdasError> {
        let v = Validator::default();
        v.validate_positive("kp_speed", config.kp_speed)?;
        v.validate_positive("max_steering_angle_deg", config.max_steering_angle_deg)?;
        v.validate_range("max_throttle", config.max_throttle, (0.0, 1.0))?;
        v.validate_range("max_brake", config.max_brake, (0.0, 1.0))?;
        v.validate_non_negative("steering_deadband_deg", config.steering_deadband_deg)?;
        Ok(Self { config })
    }

    /// Map a motion plan to throttle, brake and steering
    pub fn to_command(&self, plan: &MotionPlan, current_speed_mps: f64) -> Result<ControlCommand, AdasError> {
        Validator::default()
            .validate_non_negative("current_speed_mps", current_speed_mps)
            .map_err(|e| AdasError::Control(e.to_string()))?;
        plan.validate()
            .map_err(|e| AdasError::Control(format!("Invalid motion plan: {}", e)))?;

        let error = plan.target_speed_mps - current_speed_mps;
        let (throttle, brake) = if error >= 0.0 {
            ((self.config.kp_speed * error).min(self.config.max_throttle), 0.0)
        } else {
            (0.0, (self.config.kp_speed * -error).min(self.config.max_brake))
        };

        let steering = if plan.steering_angle_deg.abs() < self.config.steering_deadband_deg {
            0.0
        } else {
            (plan.steering_angle_deg / self.config.max_steering_angle_deg).clamp(-1.0, 1.0)
        };

        let cmd = ControlCommand::new(throttle, brake, steering);
        cmd.validate()
            .map_err(|e| AdasError::Control(format!("Produced invalid command: {}", e)))?;

        debug!(
            throttle = cmd.throttle,
            brake = cmd.brake,
            steering = cmd.steering,
            "Control command"
        );
        Ok(cmd)
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }
}
