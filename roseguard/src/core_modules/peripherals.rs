// THEORY:
// The controller never touches hardware directly. Everything outside the control
// logic (camera, servo, relay, arm-disable switch, photo storage) is reached
// through the small capability traits in this module, and the mutable outputs are
// bundled into `Peripherals` so the controller can own them and guarantee their
// shutdown.
//
// Shutdown is the one hard safety rule: on every way out of the loop the relay
// must be closed and the servo released. `Peripherals::shutdown` does exactly that,
// is safe to call more than once, and also runs from `Drop` so an unwinding panic
// still leaves the valve shut.

use crate::error::Result;
use image::RgbImage;
use std::path::PathBuf;
use tracing::{info, warn};

/// Supplies successive camera images.
pub trait FrameSource {
    /// The next frame, `Ok(None)` once the stream has ended cleanly.
    /// An error is fatal to the run loop.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// The pointing servo.
pub trait Actuator: Send {
    fn set_position(&mut self, microseconds: u32) -> Result<()>;
    /// Stops driving the servo so it can rest unpowered.
    fn disable(&mut self) -> Result<()>;
}

/// The binary firing output (valve relay).
pub trait Trigger: Send {
    fn set(&mut self, active: bool) -> Result<()>;
}

/// Hardware switch that disarms firing while asserted.
pub trait DebugSwitch: Send {
    fn is_asserted(&mut self) -> Result<bool>;
}

/// Persists frames captured at the moment of firing.
pub trait Storage: Send {
    /// Saves `image`, using `hint` to name it, and returns where it went.
    fn save(&mut self, image: &RgbImage, hint: &str) -> Result<PathBuf>;
}

/// The collaborators the controller drives every cycle.
pub struct Peripherals {
    pub actuator: Box<dyn Actuator>,
    pub trigger: Box<dyn Trigger>,
    pub debug_switch: Box<dyn DebugSwitch>,
    pub storage: Box<dyn Storage>,
    shut_down: bool,
}

impl Peripherals {
    pub fn new(
        actuator: Box<dyn Actuator>,
        trigger: Box<dyn Trigger>,
        debug_switch: Box<dyn DebugSwitch>,
        storage: Box<dyn Storage>,
    ) -> Self {
        Self {
            actuator,
            trigger,
            debug_switch,
            storage,
            shut_down: false,
        }
    }

    /// Puts the outputs in their idle state: relay closed, servo at rest.
    /// Errors here are initialization failures and are returned to the caller.
    pub fn arm(&mut self, rest_position: u32) -> Result<()> {
        self.trigger.set(false)?;
        self.actuator.set_position(rest_position)?;
        self.shut_down = false;
        Ok(())
    }

    /// Reads the arm-disable switch. A failed read counts as asserted so a broken
    /// switch can never enable firing.
    pub fn debugging(&mut self) -> bool {
        match self.debug_switch.is_asserted() {
            Ok(asserted) => asserted,
            Err(e) => {
                warn!("Debug switch read failed ({e}); treating as DEBUG ON.");
                true
            }
        }
    }

    /// Forces the trigger off and disables the actuator. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if let Err(e) = self.trigger.set(false) {
            warn!("Failed to force trigger off during shutdown: {e}");
        }
        if let Err(e) = self.actuator.disable() {
            warn!("Failed to disable actuator during shutdown: {e}");
        }
        info!("Outputs safed: trigger off, actuator disabled.");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl Drop for Peripherals {
    fn drop(&mut self) {
        // Best effort: `shutdown` is a no-op if the run loop already did it.
        self.shutdown();
    }
}
