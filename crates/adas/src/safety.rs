//! Safety envelope enforcement
//!
//! Checks motion plans and following distance against [`SafetyLimits`],
//! clamps actuator commands into their legal domain and tracks the
//! steering rate. Violations are reported as values; what to do about
//! them is decided by the caller.

use std::cell::Cell;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::SafetyLimits;
use crate::control::ControlCommand;
use crate::object::TrackedObject;
use crate::planning::MotionPlan;

/// Horizon over which a plan's speed change is assumed to happen (seconds)
pub const PLAN_HORIZON_S: f64 = 0.1;

/// Recommended headway (seconds)
const SAFE_HEADWAY_S: f64 = 2.0;

/// A hard safety limit was exceeded
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SafetyViolation {
    #[error("Target speed {target_mps:.1} m/s exceeds limit {limit_mps:.1} m/s")]
    SpeedLimit { target_mps: f64, limit_mps: f64 },

    #[error("Steering angle {angle_rad:.3} rad exceeds limit ±{limit_rad:.3} rad")]
    SteeringAngle { angle_rad: f64, limit_rad: f64 },

    #[error("Deceleration {decel_mps2:.2} m/s² exceeds limit {limit_mps2:.2} m/s²")]
    Deceleration { decel_mps2: f64, limit_mps2: f64 },

    #[error("Following distance {distance_m:.1}m below minimum {min_m:.1}m")]
    FollowingDistance { distance_m: f64, min_m: f64 },
}

/// Safety monitor
#[derive(Debug)]
pub struct SafetyMonitor {
    limits: SafetyLimits,

    /// Steering of the previous command, once one has been seen
    last_steering: Option<f64>,
    elapsed_s: f64,
    warnings: Cell<u64>,
}

impl SafetyMonitor {
    pub fn new(limits: SafetyLimits) -> Self {
        Self {
            limits,
            last_steering: None,
            elapsed_s: 0.0,
            warnings: Cell::new(0),
        }
    }

    pub fn limits(&self) -> &SafetyLimits {
        &self.limits
    }

    /// First hard limit the plan breaks, if any
    pub fn check_motion_plan(&self, plan: &MotionPlan, current_speed_mps: f64) -> Result<(), SafetyViolation> {
        match self.motion_plan_violations(plan, current_speed_mps).into_iter().next() {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    /// Every hard limit the plan breaks, in check order
    pub fn motion_plan_violations(&self, plan: &MotionPlan, current_speed_mps: f64) -> Vec<SafetyViolation> {
        let limits = &self.limits;
        let mut violations = Vec::new();

        if plan.target_speed_mps > limits.max_speed_mps {
            violations.push(SafetyViolation::SpeedLimit {
                target_mps: plan.target_speed_mps,
                limit_mps: limits.max_speed_mps,
            });
        }

        let angle_rad = plan.steering_angle_deg.to_radians();
        if angle_rad.abs() > limits.max_steering_angle_rad {
            violations.push(SafetyViolation::SteeringAngle {
                angle_rad,
                limit_rad: limits.max_steering_angle_rad,
            });
        }

        let delta = plan.target_speed_mps - current_speed_mps;
        if delta > 0.0 {
            let accel = delta / PLAN_HORIZON_S;
            if accel > limits.max_acceleration_mps2 {
                self.warn(format_args!(
                    "High acceleration requested: {:.2} m/s² (limit: {:.2} m/s²)",
                    accel, limits.max_acceleration_mps2
                ));
            }
        } else {
            let decel = -delta / PLAN_HORIZON_S;
            if decel > limits.max_deceleration_mps2 {
                violations.push(SafetyViolation::Deceleration {
                    decel_mps2: decel,
                    limit_mps2: limits.max_deceleration_mps2,
                });
            }
        }

        violations
    }

    /// Check the gap to the lead object
    pub fn check_following_distance(
        &self,
        lead: Option<&TrackedObject>,
        ego_speed_mps: f64,
    ) -> Result<(), SafetyViolation> {
        let Some(lead) = lead else {
            return Ok(());
        };

        let min_m = self.limits.min_following_distance_m;
        if lead.distance_m < min_m {
            return Err(SafetyViolation::FollowingDistance {
                distance_m: lead.distance_m,
                min_m,
            });
        }

        let safe_distance = min_m.max(ego_speed_mps * SAFE_HEADWAY_S);
        if lead.distance_m < safe_distance {
            self.warn(format_args!(
                "Following distance {:.1}m below recommended {:.1}m at {:.1} m/s",
                lead.distance_m, safe_distance, ego_speed_mps
            ));
        }
        Ok(())
    }

    /// Lowest target speed reachable within the plan horizon
    pub fn max_deceleration_target(&self, current_speed_mps: f64) -> f64 {
        (current_speed_mps - self.limits.max_deceleration_mps2 * PLAN_HORIZON_S).max(0.0)
    }

    /// Pull a plan back inside the speed, deceleration and steering limits
    pub fn clamp_motion_plan(&self, plan: &MotionPlan, current_speed_mps: f64) -> MotionPlan {
        let floor = self.max_deceleration_target(current_speed_mps);
        let ceiling = self.limits.max_speed_mps;
        let target_speed_mps = plan.target_speed_mps.min(ceiling).max(floor.min(ceiling));

        let max_deg = self.limits.max_steering_angle_rad.to_degrees();
        let steering_angle_deg = plan.steering_angle_deg.clamp(-max_deg, max_deg);

        MotionPlan {
            target_speed_mps,
            steering_angle_deg,
            reason: plan.reason.clone(),
        }
    }

    /// Clamp a command into its legal domain, zeroing non-finite fields
    pub fn sanitize_control_command(&self, cmd: &ControlCommand) -> ControlCommand {
        let clamp = |value: f64, min: f64, max: f64| {
            if value.is_finite() {
                value.clamp(min, max)
            } else {
                0.0
            }
        };

        let sanitized = ControlCommand::new(
            clamp(cmd.throttle, 0.0, 1.0),
            clamp(cmd.brake, 0.0, 1.0),
            clamp(cmd.steering, -1.0, 1.0),
        );

        // Bitwise compare so NaN inputs count as changed
        let changed = sanitized.throttle.to_bits() != cmd.throttle.to_bits()
            || sanitized.brake.to_bits() != cmd.brake.to_bits()
            || sanitized.steering.to_bits() != cmd.steering.to_bits();
        if changed {
            self.warn(format_args!(
                "Control command clamped: throttle {:.2}->{:.2}, brake {:.2}->{:.2}, steering {:.3}->{:.3}",
                cmd.throttle, sanitized.throttle, cmd.brake, sanitized.brake, cmd.steering, sanitized.steering
            ));
        }
        sanitized
    }

    /// Track the steering rate in normalized units per second
    ///
    /// Advisory only. Returns the observed rate once a previous command exists.
    pub fn check_control_command(&mut self, cmd: &ControlCommand, dt: f64) -> Option<f64> {
        let rate = match self.last_steering {
            Some(last) if dt > 0.0 => Some((cmd.steering - last).abs() / dt),
            _ => None,
        };

        if let Some(rate) = rate {
            debug!(rate, elapsed_s = self.elapsed_s, "Steering rate");
        }

        self.last_steering = Some(cmd.steering);
        self.elapsed_s += dt;
        rate
    }

    /// Warnings logged since construction
    pub fn warning_count(&self) -> u64 {
        self.warnings.get()
    }

    /// Forget steering history
    pub fn reset(&mut self) {
        self.last_steering = None;
        self.elapsed_s = 0.0;
    }

    fn warn(&self, message: std::fmt::Arguments<'_>) {
        self.warnings.set(self.warnings.get() + 1);
        warn!("{}", message);
    }
}

impl Default for SafetyMonitor {
    fn default() -> Self {
        Self::new(SafetyLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::BoundingBox;

    fn plan(target: f64, steering: f64) -> MotionPlan {
        MotionPlan {
            target_speed_mps: target,
            steering_angle_deg: steering,
            reason: "test".to_string(),
        }
    }

    fn lead(distance_m: f64) -> TrackedObject {
        TrackedObject {
            track_id: 1,
            bbox: BoundingBox::new(600.0, 300.0, 680.0, 380.0, 0.9, "vehicle"),
            velocity_mps: 0.0,
            distance_m,
        }
    }

    #[test]
    fn test_nominal_plan_passes() {
        let monitor = SafetyMonitor::default();
        assert!(monitor.check_motion_plan(&plan(10.1, 5.0), 10.0).is_ok());
    }

    #[test]
    fn test_speed_limit() {
        let monitor = SafetyMonitor::default();
        let err = monitor.check_motion_plan(&plan(40.0, 0.0), 40.0).unwrap_err();
        assert!(matches!(err, SafetyViolation::SpeedLimit { .. }));
        assert_eq!(err.to_string(), "Target speed 40.0 m/s exceeds limit 33.0 m/s");
    }

    #[test]
    fn test_steering_angle() {
        let monitor = SafetyMonitor::default();
        let err = monitor.check_motion_plan(&plan(10.0, 35.0), 10.0).unwrap_err();
        assert!(matches!(err, SafetyViolation::SteeringAngle { .. }));
        assert!(monitor.check_motion_plan(&plan(10.0, -29.0), 10.0).is_ok());
    }

    #[test]
    fn test_hard_deceleration() {
        let monitor = SafetyMonitor::default();
        let err = monitor.check_motion_plan(&plan(5.0, 0.0), 10.0).unwrap_err();
        match err {
            SafetyViolation::Deceleration { decel_mps2, .. } => assert!((decel_mps2 - 50.0).abs() < 1e-9),
            other => panic!("unexpected violation {:?}", other),
        }
    }

    #[test]
    fn test_acceleration_only_warns() {
        let monitor = SafetyMonitor::default();
        assert!(monitor.check_motion_plan(&plan(15.0, 0.0), 10.0).is_ok());
        assert_eq!(monitor.warning_count(), 1);
    }

    #[test]
    fn test_all_violations_collected() {
        let monitor = SafetyMonitor::default();
        let violations = monitor.motion_plan_violations(&plan(0.0, 45.0), 20.0);
        assert_eq!(violations.len(), 2);
        assert!(matches!(violations[0], SafetyViolation::SteeringAngle { .. }));
        assert!(matches!(violations[1], SafetyViolation::Deceleration { .. }));
    }

    #[test]
    fn test_following_distance() {
        let monitor = SafetyMonitor::default();
        assert!(monitor.check_following_distance(None, 20.0).is_ok());

        let err = monitor.check_following_distance(Some(&lead(1.0)), 5.0).unwrap_err();
        assert!(matches!(err, SafetyViolation::FollowingDistance { .. }));

        // Inside the two-second gap but above the minimum: warning only
        assert!(monitor.check_following_distance(Some(&lead(10.0)), 10.0).is_ok());
        assert_eq!(monitor.warning_count(), 1);
        assert!(monitor.check_following_distance(Some(&lead(30.0)), 10.0).is_ok());
        assert_eq!(monitor.warning_count(), 1);
    }

    #[test]
    fn test_sanitize_clamps_to_domain() {
        let monitor = SafetyMonitor::default();
        let cmd = monitor.sanitize_control_command(&ControlCommand::new(1.5, -0.5, 2.0));
        assert_eq!(cmd, ControlCommand::new(1.0, 0.0, 1.0));
        assert_eq!(monitor.warning_count(), 1);

        let cmd = monitor.sanitize_control_command(&ControlCommand::new(-0.3, 0.2, -3.0));
        assert_eq!(cmd, ControlCommand::new(0.0, 0.2, -1.0));
    }

    #[test]
    fn test_sanitize_zeroes_non_finite() {
        let monitor = SafetyMonitor::default();
        let cmd = monitor.sanitize_control_command(&ControlCommand::new(f64::NAN, f64::INFINITY, 0.4));
        assert_eq!(cmd, ControlCommand::new(0.0, 0.0, 0.4));
    }

    #[test]
    fn test_sanitize_passes_valid_command_silently() {
        let monitor = SafetyMonitor::default();
        let input = ControlCommand::new(0.4, 0.0, -0.2);
        assert_eq!(monitor.sanitize_control_command(&input), input);
        assert_eq!(monitor.warning_count(), 0);
    }

    #[test]
    fn test_clamp_motion_plan() {
        let monitor = SafetyMonitor::default();

        let clamped = monitor.clamp_motion_plan(&plan(40.0, 45.0), 30.0);
        assert_eq!(clamped.target_speed_mps, 33.0);
        assert!((clamped.steering_angle_deg - 0.52f64.to_degrees()).abs() < 1e-9);

        // Target below reachable deceleration is raised to it
        let clamped = monitor.clamp_motion_plan(&plan(0.0, 0.0), 10.0);
        assert!((clamped.target_speed_mps - 9.2).abs() < 1e-9);

        let clamped = monitor.clamp_motion_plan(&plan(0.0, 0.0), 0.5);
        assert_eq!(clamped.target_speed_mps, 0.0);
        assert!(monitor.check_motion_plan(&clamped, 0.5).is_ok());
    }

    #[test]
    fn test_steering_rate_tracking() {
        let mut monitor = SafetyMonitor::default();
        assert_eq!(monitor.check_control_command(&ControlCommand::new(0.0, 0.0, 0.1), 0.05), None);

        let rate = monitor.check_control_command(&ControlCommand::new(0.0, 0.0, 0.2), 0.05).unwrap();
        assert!((rate - 2.0).abs() < 1e-9);

        monitor.reset();
        assert_eq!(monitor.check_control_command(&ControlCommand::new(0.0, 0.0, 0.9), 0.05), None);
    }
}
