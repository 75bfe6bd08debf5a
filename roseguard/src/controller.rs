// THEORY:
// The `controller` module is the top-level API of the targeting engine. It owns
// every piece of state that must survive from one frame to the next (reference
// frame, track state, shot budget, refresh schedule) together with the hardware
// collaborators, and threads them through the components once per frame:
//
//   frame -> reference check -> MotionDetector -> TargetTracker
//         -> AimController (always) -> FireController (when acquired)
//
// Key principles:
// 1.  **One owner**: all mutable state lives in `TargetingController` and is
//     handed to components by exclusive reference. Nothing is global and nothing
//     is shared across threads.
// 2.  **Refresh short-circuit**: a cycle that replaces the reference frame returns
//     immediately. It never detects, tracks, aims, or fires.
// 3.  **Reports, not callbacks**: each cycle produces a `CycleReport` describing
//     what happened, which the caller may display or inspect in tests.
// 4.  **Unconditional shutdown**: `run` safes the outputs on every exit path,
//     and `Peripherals` repeats it on drop.

use crate::config::ControllerConfig;
use crate::core_modules::aim::AimController;
use crate::core_modules::clock::Clock;
use crate::core_modules::detection::Detection;
use crate::core_modules::fire_control::{
    FireController, FireDecision, HoldReason, RefreshCause, ShotBudget, ShotRecord,
};
use crate::core_modules::frame::Frame;
use crate::core_modules::motion_detector::MotionDetector;
use crate::core_modules::peripherals::{FrameSource, Peripherals};
use crate::core_modules::reference_frame::{RefreshReason, ReferenceFrameManager};
use crate::core_modules::tracker::{TargetTracker, TrackState};
use crate::error::Result;
use image::RgbImage;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything decided during a cycle that ran the full pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub detection: Option<Detection>,
    pub state: TrackState,
    /// Servo command issued this cycle, in microseconds.
    pub command: u32,
    pub decision: FireDecision,
    pub debugging: bool,
    pub shot: Option<ShotRecord>,
}

/// The result of processing a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    /// The frame became the new reference; nothing else happened this cycle.
    ReferenceRefreshed { reason: RefreshReason },
    Processed(CycleOutcome),
}

impl CycleReport {
    pub fn outcome(&self) -> Option<&CycleOutcome> {
        match self {
            CycleReport::Processed(outcome) => Some(outcome),
            CycleReport::ReferenceRefreshed { .. } => None,
        }
    }

    pub fn fired(&self) -> bool {
        self.outcome().is_some_and(|o| o.shot.is_some())
    }
}

/// What the observer wants after seeing a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The observer asked to stop (quit key, interrupt).
    Quit,
    /// The frame source reported the end of its stream.
    SourceExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub refreshes: u64,
    pub total_shots: u64,
    pub exit: RunExit,
}

/// The main, top-level struct of the targeting engine.
pub struct TargetingController {
    config: ControllerConfig,
    detector: MotionDetector,
    reference: ReferenceFrameManager,
    tracker: TargetTracker,
    aim: AimController,
    fire: FireController,
    budget: ShotBudget,
    peripherals: Peripherals,
    clock: Box<dyn Clock>,
    cycles: u64,
}

impl TargetingController {
    pub fn new(
        config: ControllerConfig,
        peripherals: Peripherals,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let now = clock.now();
        Ok(Self {
            detector: MotionDetector::new(&config),
            reference: ReferenceFrameManager::new(config.ref_frame_time_limit_secs, now),
            tracker: TargetTracker::new(config.target_movement_threshold),
            aim: AimController::new(&config),
            fire: FireController::new(&config),
            budget: ShotBudget::default(),
            peripherals,
            clock,
            cycles: 0,
            config,
        })
    }

    /// Closes the trigger and centers the servo. Failure here is an
    /// initialization error and should abort startup.
    pub fn arm(&mut self) -> Result<()> {
        self.peripherals.arm(self.aim.center())
    }

    /// Processes one camera image end to end.
    pub fn run_cycle(&mut self, image: &RgbImage) -> CycleReport {
        self.cycles += 1;
        let now = self.clock.now();
        let debugging = self.peripherals.debugging();

        // An image of the wrong size can neither become the reference nor be aimed at.
        let expected = (self.config.frame_width, self.config.frame_height);
        if image.dimensions() != expected {
            warn!(
                "Image is {}x{} but the controller expects {}x{}; treating as no detection.",
                image.width(),
                image.height(),
                expected.0,
                expected.1
            );
            return self.track_and_fire(image, None, now, debugging);
        }
        let frame = Frame::prepare(image, self.config.blur_size);

        // --- Reference maintenance (short-circuits the cycle) ---
        if let Some(reason) = self.reference.refresh_reason(now) {
            info!(?reason, "Updating video reference frame.");
            self.reference.refresh(frame, now, &mut self.budget);
            return CycleReport::ReferenceRefreshed { reason };
        }

        // --- Detection ---
        let detection = self
            .reference
            .reference()
            .and_then(|reference| self.detector.detect(&frame, reference));

        self.track_and_fire(image, detection, now, debugging)
    }

    /// Tracking, aiming and the fire decision for a cycle that did not refresh.
    fn track_and_fire(
        &mut self,
        image: &RgbImage,
        detection: Option<Detection>,
        now: Instant,
        debugging: bool,
    ) -> CycleReport {
        // --- Tracking ---
        let previous_state = self.tracker.state();
        let state = self.tracker.update(detection.as_ref(), now);
        if state != previous_state {
            debug!("Status: {} -> {}", previous_state.label(), state.label());
        }

        // --- Aim (every cycle) ---
        let command = self.aim.aim(detection.as_ref());
        if let Err(e) = self.peripherals.actuator.set_position(command) {
            warn!("Servo command {command}us failed: {e}");
        }

        // --- Firing ---
        let decision = self.fire.evaluate(
            state,
            self.tracker.acquired_since(),
            self.reference.schedule(),
            &self.budget,
            now,
            debugging,
        );

        let shot = match decision {
            FireDecision::Fire => {
                let record = self.fire.fire(
                    image,
                    command,
                    self.tracker.last_position(),
                    &mut self.budget,
                    &mut self.peripherals,
                    self.clock.as_ref(),
                );
                self.tracker.reset_dwell();
                if record.forced_refresh {
                    self.reference.force_refresh();
                }
                Some(record)
            }
            FireDecision::ForceRefresh(RefreshCause::TooSoonAfterRefresh) => {
                info!("Acquired too soon after refresh. Forcing new reference frame.");
                self.reference.force_refresh();
                None
            }
            FireDecision::ForceRefresh(RefreshCause::ShotBudgetExhausted) => {
                debug!("Shot budget exhausted; waiting for a new reference frame.");
                self.reference.force_refresh();
                None
            }
            FireDecision::Hold(HoldReason::DebugSuppressed) => {
                info!("Target acquired, but DEBUG mode is ON. Not firing.");
                self.tracker.reset_dwell();
                None
            }
            FireDecision::Hold(_) => None,
        };

        CycleReport::Processed(CycleOutcome {
            detection,
            state,
            command,
            decision,
            debugging,
            shot,
        })
    }

    /// Pulls frames from `source` until it ends, fails, or `observer` returns
    /// `LoopControl::Quit`. Outputs are safed before returning, whatever the outcome.
    pub fn run<S, F>(&mut self, source: &mut S, mut observer: F) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&RgbImage, &CycleReport) -> LoopControl,
    {
        let result = self.run_loop(source, &mut observer);
        if let Err(e) = &result {
            warn!("Control loop stopped: {e}");
        }
        info!("Shutting down...");
        self.peripherals.shutdown();
        info!("System stopped.");
        result
    }

    fn run_loop<S, F>(&mut self, source: &mut S, observer: &mut F) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&RgbImage, &CycleReport) -> LoopControl,
    {
        loop {
            let Some(image) = source.next_frame()? else {
                info!("Frame source exhausted.");
                return Ok(self.summary(RunExit::SourceExhausted));
            };

            let report = self.run_cycle(&image);
            if observer(&image, &report) == LoopControl::Quit {
                info!("Quit requested. Exiting.");
                return Ok(self.summary(RunExit::Quit));
            }
        }
    }

    /// Safes the outputs. Idempotent; also happens automatically on drop.
    pub fn shutdown(&mut self) {
        self.peripherals.shutdown();
    }

    fn summary(&self, exit: RunExit) -> RunSummary {
        RunSummary {
            cycles: self.cycles,
            refreshes: self.reference.refresh_count(),
            total_shots: self.budget.total_shots,
            exit,
        }
    }

    pub fn state(&self) -> TrackState {
        self.tracker.state()
    }

    pub fn budget(&self) -> ShotBudget {
        self.budget
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn peripherals_mut(&mut self) -> &mut Peripherals {
        &mut self.peripherals
    }
}
