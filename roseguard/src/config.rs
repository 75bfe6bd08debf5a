// THEORY:
// `ControllerConfig` is the single tunable surface of the targeting core. Every
// threshold the control loop consults lives here, so the field binary can load it
// from YAML and tests can build tight, fast variants with struct-update syntax.
//
// The defaults are the values the rig was tuned with in the garden: a 640x480
// feed, a two second dwell before firing, three shots per reference frame and a
// servo swinging between 800us and 2200us.

use crate::error::{Result, RoseguardError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration for the `TargetingController`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Width of the analysed frame in pixels. Also the domain of the aim mapping.
    pub frame_width: u32,
    pub frame_height: u32,

    // --- Motion detection ---
    /// Regions must cover more than this many pixels to count as a target.
    pub min_contour_area: usize,
    /// Per-pixel intensity difference above which a pixel counts as "moving".
    pub threshold_sensitivity: u8,
    /// Gaussian kernel size (odd) applied to every grayscale frame.
    pub blur_size: u32,
    /// Passes of 3x3 dilation used to merge nearby motion fragments.
    pub dilate_iterations: u32,

    // --- Tracking ---
    /// Manhattan distance (pixels) a target may move between frames and still be stationary.
    pub target_movement_threshold: u32,
    /// Seconds a target must stay stationary before it may be fired upon.
    pub min_acquire_time_secs: u64,

    // --- Reference frame & rate limiting ---
    /// Seconds before the reference frame is refreshed on age alone.
    pub ref_frame_time_limit_secs: u64,
    /// Seconds after a reference update during which an acquisition is treated as noise.
    pub min_time_from_last_ref_frame_update_secs: u64,
    /// Shots allowed between two reference frame updates.
    pub max_shots: u32,

    // --- Servo ---
    pub servo_min_range: u32,
    pub servo_max_range: u32,
    /// Signed trim applied to the computed rest position (microseconds).
    pub servo_center_adj: i32,
    /// Half-width of the sweep performed while the trigger is open (microseconds).
    pub servo_trigger_sweep: u32,
    /// Number of left/right sweep pairs per shot.
    pub sweep_repetitions: u32,
    /// How long each sweep position is held.
    pub sweep_hold_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            frame_width: 640,
            frame_height: 480,
            min_contour_area: 500,
            threshold_sensitivity: 25,
            blur_size: 21,
            dilate_iterations: 2,
            target_movement_threshold: 50,
            min_acquire_time_secs: 2,
            ref_frame_time_limit_secs: 120,
            min_time_from_last_ref_frame_update_secs: 10,
            max_shots: 3,
            servo_min_range: 800,
            servo_max_range: 2200,
            servo_center_adj: 0,
            servo_trigger_sweep: 100,
            sweep_repetitions: 5,
            sweep_hold_ms: 200,
        }
    }
}

impl ControllerConfig {
    /// Loads a configuration from a YAML file. Missing keys fall back to the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ControllerConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// The servo rest position, including the center trim.
    pub fn servo_center(&self) -> u32 {
        let center = (self.servo_min_range + self.servo_max_range) / 2;
        (center as i64 + self.servo_center_adj as i64).max(0) as u32
    }

    pub fn sweep_hold(&self) -> Duration {
        Duration::from_millis(self.sweep_hold_ms)
    }

    /// Rejects settings that would make detection or the aim mapping meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(RoseguardError::InvalidConfig(
                "frame dimensions must be non-zero".into(),
            ));
        }
        if self.servo_min_range >= self.servo_max_range {
            return Err(RoseguardError::InvalidConfig(format!(
                "servo_min_range ({}) must be below servo_max_range ({})",
                self.servo_min_range, self.servo_max_range
            )));
        }
        if self.blur_size == 0 || self.blur_size % 2 == 0 {
            return Err(RoseguardError::InvalidConfig(format!(
                "blur_size must be a positive odd number, got {}",
                self.blur_size
            )));
        }
        if self.max_shots == 0 {
            return Err(RoseguardError::InvalidConfig(
                "max_shots must allow at least one shot".into(),
            ));
        }
        Ok(())
    }
}
