// Maps a target's horizontal position onto the servo's pulse-width range.

use crate::config::ControllerConfig;
use crate::core_modules::detection::Detection;

/// Linear, unclamped mapping from frame column to servo pulse width.
#[derive(Debug, Clone, Copy)]
pub struct AimController {
    frame_width: u32,
    servo_min: u32,
    servo_max: u32,
    servo_center: u32,
}

impl AimController {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            frame_width: config.frame_width,
            servo_min: config.servo_min_range,
            servo_max: config.servo_max_range,
            servo_center: config.servo_center(),
        }
    }

    /// Servo command in microseconds; the rest position when there is no target.
    pub fn aim(&self, detection: Option<&Detection>) -> u32 {
        match detection {
            Some(detection) => {
                let span = (self.servo_max - self.servo_min) as f64;
                let ratio = detection.center_x as f64 / self.frame_width as f64;
                (self.servo_min as f64 + ratio * span) as u32
            }
            None => self.servo_center,
        }
    }

    pub fn center(&self) -> u32 {
        self.servo_center
    }
}
