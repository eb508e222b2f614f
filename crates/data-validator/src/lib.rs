//! Data Validation
//!
//! Field-level range and sanity checks for detections, motion plans,
//! actuator commands and configuration values.

mod error;
mod validator;

pub use error::ValidationError;
pub use validator::{ValidationConfig, Validator};
