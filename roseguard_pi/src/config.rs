// Field configuration: the controller's tuning plus where the hardware lives on
// this particular Pi.

use anyhow::{Context, Result};
use roseguard::ControllerConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub controller: ControllerConfig,
    pub rig: RigConfig,
}

/// Wiring and I/O locations. Line numbers are BCM offsets on `gpio_chip`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub gpio_chip: String,
    pub trigger_line: u32,
    pub debug_switch_line: u32,
    /// sysfs directory of the PWM chip driving the servo.
    pub pwm_chip: PathBuf,
    pub pwm_channel: u32,
    /// Camera index ("0") or a video file to replay.
    pub camera_source: String,
    pub camera_warmup_ms: u64,
    pub servo_settle_ms: u64,
    pub picture_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            gpio_chip: "gpiochip0".to_string(),
            trigger_line: 17,
            debug_switch_line: 23,
            // GPIO18 is channel 2 of the RP1 PWM block on a Pi 5.
            pwm_chip: PathBuf::from("/sys/class/pwm/pwmchip0"),
            pwm_channel: 2,
            camera_source: "0".to_string(),
            camera_warmup_ms: 2000,
            servo_settle_ms: 1000,
            picture_dir: PathBuf::from("trigger_pictures"),
            log_dir: PathBuf::from("."),
        }
    }
}

impl RigConfig {
    pub fn camera_warmup(&self) -> Duration {
        Duration::from_millis(self.camera_warmup_ms)
    }

    pub fn servo_settle(&self) -> Duration {
        Duration::from_millis(self.servo_settle_ms)
    }
}

impl FieldConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.controller.validate()?;
        Ok(config)
    }
}
