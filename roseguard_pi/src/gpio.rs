//! GPIO lines for the valve relay and the arm-disable switch.
//!
//! Both use the character-device interface through `gpiod`, addressed by line
//! offset on a named chip (BCM numbering on the Pi 5 header).

use anyhow::{Context, Result};
use gpiod::{Bias, Chip, Input, Lines, Options, Output};
use roseguard::{DebugSwitch, RoseguardError, Trigger};

/// Drives the relay that opens the water valve. High opens the valve.
pub struct GpioTrigger {
    line: u32,
    request: Lines<Output>,
}

impl GpioTrigger {
    /// Claims `line` as an output, initially low so the valve starts closed.
    pub fn open(chip: &str, line: u32) -> Result<Self> {
        let chip = Chip::new(chip).with_context(|| format!("Failed to open GPIO chip '{chip}'"))?;
        let options = Options::output([line])
            .values([false])
            .consumer("roseguard-trigger");
        let request = chip
            .request_lines(options)
            .with_context(|| format!("Failed to request GPIO line {line} as output"))?;
        Ok(Self { line, request })
    }
}

impl Trigger for GpioTrigger {
    fn set(&mut self, active: bool) -> roseguard::Result<()> {
        self.request
            .set_values([active])
            .map_err(|e| RoseguardError::Trigger(format!("line {}: {e}", self.line)))
    }
}

/// Reads the debug switch. The line is pulled up, so a switch closed to ground
/// reads low and means "do not fire".
pub struct GpioDebugSwitch {
    line: u32,
    request: Lines<Input>,
}

impl GpioDebugSwitch {
    pub fn open(chip: &str, line: u32) -> Result<Self> {
        let chip = Chip::new(chip).with_context(|| format!("Failed to open GPIO chip '{chip}'"))?;
        let options = Options::input([line])
            .bias(Bias::PullUp)
            .consumer("roseguard-debug-switch");
        let request = chip
            .request_lines(options)
            .with_context(|| format!("Failed to request GPIO line {line} as input"))?;
        Ok(Self { line, request })
    }
}

impl DebugSwitch for GpioDebugSwitch {
    fn is_asserted(&mut self) -> roseguard::Result<bool> {
        let [level] = self
            .request
            .get_values([false; 1])
            .map_err(|e| RoseguardError::DebugSwitch(format!("line {}: {e}", self.line)))?;
        Ok(!level)
    }
}
