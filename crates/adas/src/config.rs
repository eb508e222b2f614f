//! ADAS configuration

use std::path::Path;

use data_validator::{ValidationError, Validator};
use serde::{Deserialize, Serialize};
use tracing::{info, Level};

use crate::AdasError;

/// Object detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum confidence for a detection to be reported
    pub confidence_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.35,
        }
    }
}

/// Multi-object tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Consecutive misses tolerated before a track is dropped
    pub max_missed_frames: u32,

    /// Maximum center distance for associating a detection (pixels)
    pub association_threshold_px: f64,

    /// Pinhole focal length used for range estimation (pixels)
    pub focal_length_px: f64,

    /// Box height floor guarding the range division (pixels)
    pub min_box_height_px: f64,

    /// Range estimates are clamped to this value (meters)
    pub max_distance_m: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_missed_frames: 5,
            association_threshold_px: 120.0,
            focal_length_px: 35.0,
            min_box_height_px: 1.0,
            max_distance_m: 200.0,
        }
    }
}

/// Behavior planner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Free-road target speed (m/s, ~54 km/h)
    pub cruise_speed_mps: f64,

    /// Below this range the close-following ramp applies (meters)
    pub min_follow_distance_m: f64,

    /// Steering angle produced at full lateral error (degrees)
    pub max_steering_deg: f64,

    /// Desired time gap to the lead object (seconds)
    pub time_gap_s: f64,

    /// Comfortable deceleration, carried for downstream consumers (m/s²)
    pub max_decel_mps2: f64,

    /// Proportional gain on normalized lateral error
    pub lane_center_gain: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            cruise_speed_mps: 15.0,
            min_follow_distance_m: 12.0,
            max_steering_deg: 22.0,
            time_gap_s: 2.0,
            max_decel_mps2: 3.0,
            lane_center_gain: 1.0,
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Proportional gain on speed error
    pub kp_speed: f64,
    pub max_throttle: f64,
    pub max_brake: f64,

    /// Physical steering angle mapped to a normalized command of 1.0 (degrees)
    pub max_steering_angle_deg: f64,

    /// Steering requests smaller than this are zeroed (degrees)
    pub steering_deadband_deg: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kp_speed: 0.15,
            max_throttle: 1.0,
            max_brake: 1.0,
            max_steering_angle_deg: 25.0,
            steering_deadband_deg: 0.5,
        }
    }
}

/// Hard safety envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyLimits {
    /// ~120 km/h
    pub max_speed_mps: f64,
    pub max_acceleration_mps2: f64,

    /// Emergency braking, below the ABS limit
    pub max_deceleration_mps2: f64,
    pub max_steering_rate_rad_s: f64,

    /// ~30 degrees
    pub max_steering_angle_rad: f64,
    pub min_following_distance_m: f64,
    pub max_lateral_offset_m: f64,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_speed_mps: 33.0,
            max_acceleration_mps2: 3.0,
            max_deceleration_mps2: 8.0,
            max_steering_rate_rad_s: 0.5,
            max_steering_angle_rad: 0.52,
            min_following_distance_m: 2.0,
            max_lateral_offset_m: 1.5,
        }
    }
}

/// What the pipeline does with a motion plan that fails a safety check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSafetyPolicy {
    /// Log the violation and pass the plan through unchanged
    Log,

    /// Clamp the plan into the envelope; brake at the permitted limit when too close
    #[default]
    Clamp,

    /// Replace the plan with a full stop
    EmergencyStop,
}

/// Log levels accepted in configuration files
pub const LOG_LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

/// Complete runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub detector: DetectorConfig,
    pub tracker: TrackerConfig,
    pub planner: PlannerConfig,
    pub controller: ControllerConfig,
    pub safety: SafetyLimits,

    /// Target processing rate of the runner
    pub fps: u32,
    pub log_level: String,
    pub plan_safety_policy: PlanSafetyPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            tracker: TrackerConfig::default(),
            planner: PlannerConfig::default(),
            controller: ControllerConfig::default(),
            safety: SafetyLimits::default(),
            fps: 20,
            log_level: "INFO".to_string(),
            plan_safety_policy: PlanSafetyPolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from an optional file, layered under
    /// `ADAS__<SECTION>__<KEY>` environment overrides, and validate it.
    ///
    /// Missing sections and keys fall back to defaults. The file format is
    /// picked from the extension (JSON, TOML, YAML).
    pub fn load(path: Option<&Path>) -> Result<Self, AdasError> {
        let mut builder = ::config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(AdasError::Configuration(format!(
                        "Configuration file not found: {}",
                        path.display()
                    )));
                }
                info!("Loading configuration from {}", path.display());
                builder = builder.add_source(::config::File::from(path));
            }
            None => info!("Using default configuration"),
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("ADAS")
                .separator("__")
                .try_parsing(true),
        );

        let config: RuntimeConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| AdasError::Configuration(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        info!("Configuration loaded and validated successfully");
        Ok(config)
    }

    /// Range-check every section
    pub fn validate(&self) -> Result<(), AdasError> {
        self.check_values().map_err(|e| AdasError::Configuration(e.to_string()))?;

        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(AdasError::Configuration(format!(
                "Invalid log level: {}",
                self.log_level
            )));
        }
        Ok(())
    }

    fn check_values(&self) -> Result<(), ValidationError> {
        let v = Validator::default();

        v.validate_config_value("detector.confidence_threshold", self.detector.confidence_threshold, Some(0.0), Some(1.0))?;

        let t = &self.tracker;
        v.validate_config_value("tracker.max_missed_frames", t.max_missed_frames as f64, Some(1.0), Some(100.0))?;
        v.validate_config_value("tracker.association_threshold_px", t.association_threshold_px, Some(1.0), Some(1000.0))?;
        v.validate_config_value("tracker.focal_length_px", t.focal_length_px, Some(1.0), Some(1000.0))?;
        v.validate_positive("tracker.min_box_height_px", t.min_box_height_px)?;
        v.validate_positive("tracker.max_distance_m", t.max_distance_m)?;

        let p = &self.planner;
        v.validate_config_value("planner.cruise_speed_mps", p.cruise_speed_mps, Some(0.0), Some(50.0))?;
        v.validate_config_value("planner.min_follow_distance_m", p.min_follow_distance_m, Some(0.0), Some(100.0))?;
        v.validate_config_value("planner.max_steering_deg", p.max_steering_deg, Some(0.0), Some(45.0))?;
        v.validate_config_value("planner.time_gap_s", p.time_gap_s, Some(0.5), Some(5.0))?;
        v.validate_non_negative("planner.max_decel_mps2", p.max_decel_mps2)?;
        v.validate_finite("planner.lane_center_gain", p.lane_center_gain)?;

        let c = &self.controller;
        v.validate_config_value("controller.kp_speed", c.kp_speed, Some(0.0), Some(10.0))?;
        v.validate_config_value("controller.max_throttle", c.max_throttle, Some(0.0), Some(1.0))?;
        v.validate_config_value("controller.max_brake", c.max_brake, Some(0.0), Some(1.0))?;
        v.validate_positive("controller.max_steering_angle_deg", c.max_steering_angle_deg)?;
        v.validate_non_negative("controller.steering_deadband_deg", c.steering_deadband_deg)?;

        let s = &self.safety;
        v.validate_config_value("safety.max_speed_mps", s.max_speed_mps, Some(0.0), Some(100.0))?;
        v.validate_config_value("safety.max_acceleration_mps2", s.max_acceleration_mps2, Some(0.0), Some(10.0))?;
        v.validate_config_value("safety.max_deceleration_mps2", s.max_deceleration_mps2, Some(0.0), Some(15.0))?;
        v.validate_non_negative("safety.max_steering_rate_rad_s", s.max_steering_rate_rad_s)?;
        v.validate_non_negative("safety.max_steering_angle_rad", s.max_steering_angle_rad)?;
        v.validate_non_negative("safety.min_following_distance_m", s.min_following_distance_m)?;
        v.validate_non_negative("safety.max_lateral_offset_m", s.max_lateral_offset_m)?;

        v.validate_config_value("fps", self.fps as f64, Some(1.0), Some(120.0))?;
        Ok(())
    }

    /// Tracing level matching `log_level`
    pub fn tracing_level(&self) -> Level {
        parse_log_level(&self.log_level).unwrap_or(Level::INFO)
    }
}

/// Map a configuration log level name onto a tracing level
pub fn parse_log_level(name: &str) -> Option<Level> {
    match name.to_ascii_uppercase().as_str() {
        "TRACE" => Some(Level::TRACE),
        "DEBUG" => Some(Level::DEBUG),
        "INFO" => Some(Level::INFO),
        "WARNING" | "WARN" => Some(Level::WARN),
        "ERROR" | "CRITICAL" => Some(Level::ERROR),
        _ => None,
    }
}
