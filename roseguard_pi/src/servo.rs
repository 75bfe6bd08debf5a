//! Hobby servo on a kernel PWM channel (`/sys/class/pwm`).
//!
//! The channel runs a 50 Hz period; the pulse width in microseconds becomes the
//! duty cycle in nanoseconds. Output is only enabled once the first position has
//! been written, so the servo does not jump to whatever duty the channel held.

use anyhow::{Context, Result, bail};
use roseguard::{Actuator, RoseguardError};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const PERIOD_NS: u64 = 20_000_000;
const EXPORT_POLL: Duration = Duration::from_millis(50);
const EXPORT_ATTEMPTS: u32 = 20;

pub struct SysfsPwmServo {
    channel_dir: PathBuf,
    enabled: bool,
}

impl SysfsPwmServo {
    /// Exports `channel` on `chip_dir` if needed and programs the 50 Hz period.
    pub fn open(chip_dir: impl AsRef<Path>, channel: u32) -> Result<Self> {
        let chip_dir = chip_dir.as_ref();
        let channel_dir = chip_dir.join(format!("pwm{channel}"));

        if !channel_dir.exists() {
            fs::write(chip_dir.join("export"), channel.to_string()).with_context(|| {
                format!("Failed to export PWM channel {channel} on {}", chip_dir.display())
            })?;
            // udev creates the attribute files asynchronously.
            let mut attempts = 0;
            while !channel_dir.exists() {
                attempts += 1;
                if attempts > EXPORT_ATTEMPTS {
                    bail!("PWM channel {} did not appear", channel_dir.display());
                }
                std::thread::sleep(EXPORT_POLL);
            }
        }

        let servo = Self {
            channel_dir,
            enabled: false,
        };
        servo.write_attr("period", PERIOD_NS).with_context(|| {
            format!(
                "Failed to set PWM period on {}",
                servo.channel_dir.display()
            )
        })?;
        Ok(servo)
    }

    fn write_attr(&self, name: &str, value: impl ToString) -> std::io::Result<()> {
        fs::write(self.channel_dir.join(name), value.to_string())
    }

    fn actuator_error(&self, what: &str, e: std::io::Error) -> RoseguardError {
        RoseguardError::Actuator(format!("{what} on {}: {e}", self.channel_dir.display()))
    }
}

impl Actuator for SysfsPwmServo {
    fn set_position(&mut self, microseconds: u32) -> roseguard::Result<()> {
        let duty_ns = microseconds as u64 * 1000;
        if duty_ns > PERIOD_NS {
            return Err(RoseguardError::Actuator(format!(
                "pulse width {microseconds}us exceeds the 20ms period"
            )));
        }
        self.write_attr("duty_cycle", duty_ns)
            .map_err(|e| self.actuator_error("duty_cycle", e))?;
        if !self.enabled {
            self.write_attr("enable", 1)
                .map_err(|e| self.actuator_error("enable", e))?;
            self.enabled = true;
        }
        Ok(())
    }

    fn disable(&mut self) -> roseguard::Result<()> {
        self.write_attr("enable", 0)
            .map_err(|e| self.actuator_error("disable", e))?;
        self.enabled = false;
        Ok(())
    }
}
