//! Error types for the targeting controller and its collaborators.

use thiserror::Error;

/// Result type used across the roseguard library.
pub type Result<T> = std::result::Result<T, RoseguardError>;

/// Errors raised by the controller or surfaced from a collaborator.
///
/// Policy violations (firing too soon, exhausted shot budget) are never errors;
/// they are state transitions handled by the fire controller.
#[derive(Debug, Error)]
pub enum RoseguardError {
    #[error("frame acquisition failed: {0}")]
    Acquisition(String),

    #[error("actuator command failed: {0}")]
    Actuator(String),

    #[error("trigger command failed: {0}")]
    Trigger(String),

    #[error("debug switch read failed: {0}")]
    DebugSwitch(String),

    #[error("image storage failed: {0}")]
    Storage(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
