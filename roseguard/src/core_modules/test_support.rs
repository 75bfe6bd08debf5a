// Test doubles shared by the unit tests: a clock that only moves when told to,
// a rig that records every hardware command, and synthetic frame builders.

use crate::core_modules::clock::Clock;
use crate::core_modules::frame::Frame;
use crate::core_modules::peripherals::{
    Actuator, DebugSwitch, FrameSource, Peripherals, Storage, Trigger,
};
use crate::error::{Result, RoseguardError};
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct FakeClock {
    now: Arc<Mutex<Instant>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.now.lock().unwrap() += duration;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareEvent {
    Position(u32),
    Disable,
    Trigger(bool),
    Saved(String),
}

#[derive(Default)]
struct RigState {
    events: Vec<HardwareEvent>,
    saved: Vec<RgbImage>,
    debug: bool,
    fail_actuator: bool,
    fail_trigger: bool,
    fail_switch: bool,
    fail_storage: bool,
}

/// Shared recorder behind the boxed collaborators handed to `Peripherals`.
#[derive(Clone, Default)]
pub struct RecordingRig {
    state: Arc<Mutex<RigState>>,
}

impl RecordingRig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peripherals(&self) -> Peripherals {
        Peripherals::new(
            Box::new(RecordingActuator(self.clone())),
            Box::new(RecordingTrigger(self.clone())),
            Box::new(RecordingSwitch(self.clone())),
            Box::new(RecordingStorage(self.clone())),
        )
    }

    pub fn events(&self) -> Vec<HardwareEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Every image handed to storage, in order.
    pub fn saved_images(&self) -> Vec<RgbImage> {
        self.state.lock().unwrap().saved.clone()
    }

    pub fn trigger_activations(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == HardwareEvent::Trigger(true))
            .count()
    }

    pub fn set_debug(&self, asserted: bool) {
        self.state.lock().unwrap().debug = asserted;
    }

    pub fn fail_actuator(&self, fail: bool) {
        self.state.lock().unwrap().fail_actuator = fail;
    }

    pub fn fail_trigger(&self, fail: bool) {
        self.state.lock().unwrap().fail_trigger = fail;
    }

    pub fn fail_switch(&self, fail: bool) {
        self.state.lock().unwrap().fail_switch = fail;
    }

    pub fn fail_storage(&self, fail: bool) {
        self.state.lock().unwrap().fail_storage = fail;
    }

    fn record(&self, event: HardwareEvent) {
        self.state.lock().unwrap().events.push(event);
    }
}

struct RecordingActuator(RecordingRig);

impl Actuator for RecordingActuator {
    fn set_position(&mut self, microseconds: u32) -> Result<()> {
        if self.0.state.lock().unwrap().fail_actuator {
            return Err(RoseguardError::Actuator("servo unplugged".into()));
        }
        self.0.record(HardwareEvent::Position(microseconds));
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.0.record(HardwareEvent::Disable);
        Ok(())
    }
}

struct RecordingTrigger(RecordingRig);

impl Trigger for RecordingTrigger {
    fn set(&mut self, active: bool) -> Result<()> {
        if self.0.state.lock().unwrap().fail_trigger {
            return Err(RoseguardError::Trigger("relay line busy".into()));
        }
        self.0.record(HardwareEvent::Trigger(active));
        Ok(())
    }
}

struct RecordingSwitch(RecordingRig);

impl DebugSwitch for RecordingSwitch {
    fn is_asserted(&mut self) -> Result<bool> {
        let state = self.0.state.lock().unwrap();
        if state.fail_switch {
            return Err(RoseguardError::DebugSwitch("line read failed".into()));
        }
        Ok(state.debug)
    }
}

struct RecordingStorage(RecordingRig);

impl Storage for RecordingStorage {
    fn save(&mut self, image: &RgbImage, hint: &str) -> Result<PathBuf> {
        if self.0.state.lock().unwrap().fail_storage {
            return Err(RoseguardError::Io(std::io::Error::other("disk full")));
        }
        self.0.state.lock().unwrap().saved.push(image.clone());
        self.0.record(HardwareEvent::Saved(hint.to_string()));
        Ok(PathBuf::from(format!("trigger_{hint}.jpg")))
    }
}

/// Replays frames, winding the fake clock forward before each one.
pub struct ScriptedSource {
    frames: VecDeque<(Duration, RgbImage)>,
    clock: FakeClock,
    fail_when_empty: bool,
}

impl ScriptedSource {
    pub fn new(clock: FakeClock) -> Self {
        Self {
            frames: VecDeque::new(),
            clock,
            fail_when_empty: false,
        }
    }

    pub fn push(&mut self, delay: Duration, image: RgbImage) -> &mut Self {
        self.frames.push_back((delay, image));
        self
    }

    pub fn fail_when_empty(&mut self) -> &mut Self {
        self.fail_when_empty = true;
        self
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        match self.frames.pop_front() {
            Some((delay, image)) => {
                self.clock.advance(delay);
                Ok(Some(image))
            }
            None if self.fail_when_empty => {
                Err(RoseguardError::Acquisition("camera disconnected".into()))
            }
            None => Ok(None),
        }
    }
}

pub fn gray_frame(width: u32, height: u32, value: u8) -> Frame {
    gray_frame_with_rects(width, height, value, &[])
}

/// A grayscale frame with filled `(x, y, w, h, value)` rectangles, no smoothing applied.
pub fn gray_frame_with_rects(
    width: u32,
    height: u32,
    background: u8,
    rects: &[(u32, u32, u32, u32, u8)],
) -> Frame {
    let mut intensity = GrayImage::from_pixel(width, height, Luma([background]));
    for &(x, y, w, h, value) in rects {
        for py in y..(y + h).min(height) {
            for px in x..(x + w).min(width) {
                intensity.put_pixel(px, py, Luma([value]));
            }
        }
    }
    Frame { intensity }
}

pub fn rgb_frame(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
}

/// An RGB frame with one filled square of side `size` centered on `(cx, cy)`.
pub fn rgb_frame_with_square(width: u32, height: u32, cx: u32, cy: u32, size: u32) -> RgbImage {
    let mut image = rgb_frame(width, height, 0);
    let half = size / 2;
    for py in cy.saturating_sub(half)..(cy + half).min(height) {
        for px in cx.saturating_sub(half)..(cx + half).min(width) {
            image.put_pixel(px, py, Rgb([255, 255, 255]));
        }
    }
    image
}
