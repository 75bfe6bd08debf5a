// THEORY:
// This file is the main entry point for the `roseguard` library crate, the
// hardware-independent core of a motion-triggered garden sprinkler. It exposes
// the `TargetingController` and its reports as the high-level interface, and the
// capability traits in `core_modules::peripherals` as the seam where a binary
// plugs in a real camera, servo, relay and switch.
//
// Everything in here runs, and is tested, without any hardware attached. Time is
// read through the `Clock` trait, so tests drive the control loop with a fake
// clock instead of sleeping.

pub mod config;
pub mod controller;
pub mod core_modules;
pub mod error;

pub use config::ControllerConfig;
pub use controller::{
    CycleOutcome, CycleReport, LoopControl, RunExit, RunSummary, TargetingController,
};
pub use core_modules::clock::{Clock, SystemClock};
pub use core_modules::peripherals::{
    Actuator, DebugSwitch, FrameSource, Peripherals, Storage, Trigger,
};
pub use core_modules::storage::ImageDirStorage;
pub use error::{Result, RoseguardError};
