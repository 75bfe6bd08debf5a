// THEORY:
// The `FireController` is the last gate between an acquired target and the water
// valve. It is deliberately conservative: most cycles with an acquired target end
// in "hold", and the guards below exist because every false trigger soaks the
// garden for nothing.
//
// Decision rules, checked in order once the tracker reports `Acquired`:
// 1.  **Dwell**: the target must have held still for the minimum acquire time.
// 2.  **Cooldown**: an acquisition shortly after a reference update is probably
//     noise the new reference introduced; unless nothing has fired yet in this
//     process, answer with a forced refresh instead of a shot.
// 3.  **Budget**: once the per-reference shot budget is spent, only a new
//     reference frame can re-arm the controller.
// 4.  **Debug switch**: while asserted the acquisition is logged, not fired upon.
// 5.  **Fire**: save the evidence with the target boxed, open the valve, sweep
//     the servo, close the valve. A shot that exactly spends the budget still
//     fires and then forces a refresh for the next cycle.
//
// `evaluate` is pure. The side effects of a decision (raising the force flag,
// clearing the dwell timer) belong to the controller, which owns that state;
// `fire` performs the blocking hardware sequence.

use crate::config::ControllerConfig;
use crate::core_modules::clock::{Clock, whole_seconds_between};
use crate::core_modules::peripherals::Peripherals;
use crate::core_modules::reference_frame::RefreshSchedule;
use crate::core_modules::tracker::TrackState;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const TARGET_BOX_HALF: i32 = 20;
const TARGET_GREEN: Rgb<u8> = Rgb([0, 255, 0]);

/// Shot counters. `shots_since_refresh` restarts with every reference frame;
/// `total_shots` only ever grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShotBudget {
    pub shots_since_refresh: u32,
    pub total_shots: u64,
}

/// Why an acquired (or not acquired) target was not fired upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// The tracker is not in the Acquired state.
    NotAcquired,
    /// The target has not held still long enough, or its dwell was already spent.
    Dwelling,
    /// The arm-disable switch is asserted.
    DebugSuppressed,
}

/// Why the fire controller asked for a new reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshCause {
    TooSoonAfterRefresh,
    ShotBudgetExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    Hold(HoldReason),
    Fire,
    ForceRefresh(RefreshCause),
}

/// What happened during one firing sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotRecord {
    /// Position of this shot within the current reference frame's budget (1-based).
    pub shot_number: u32,
    pub total_shots: u64,
    pub target_x: i64,
    pub target_y: i64,
    /// Where the evidence frame was stored, or why storing it failed.
    pub image: std::result::Result<PathBuf, String>,
    /// True when this shot spent the budget and a refresh is now pending.
    pub forced_refresh: bool,
}

pub struct FireController {
    min_acquire_time_secs: u64,
    min_time_from_last_ref_frame_update_secs: u64,
    max_shots: u32,
    sweep: u32,
    sweep_repetitions: u32,
    sweep_hold: Duration,
}

impl FireController {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            min_acquire_time_secs: config.min_acquire_time_secs,
            min_time_from_last_ref_frame_update_secs: config
                .min_time_from_last_ref_frame_update_secs,
            max_shots: config.max_shots,
            sweep: config.servo_trigger_sweep,
            sweep_repetitions: config.sweep_repetitions,
            sweep_hold: config.sweep_hold(),
        }
    }

    /// Applies the firing rules to the current tracking and budget state.
    pub fn evaluate(
        &self,
        state: TrackState,
        acquired_since: Option<Instant>,
        schedule: &RefreshSchedule,
        budget: &ShotBudget,
        now: Instant,
        debugging: bool,
    ) -> FireDecision {
        if state != TrackState::Acquired {
            return FireDecision::Hold(HoldReason::NotAcquired);
        }

        let Some(acquired_since) = acquired_since else {
            return FireDecision::Hold(HoldReason::Dwelling);
        };
        if whole_seconds_between(acquired_since, now) < self.min_acquire_time_secs {
            return FireDecision::Hold(HoldReason::Dwelling);
        }

        let since_refresh = whole_seconds_between(schedule.ref_frame_time, now);
        if since_refresh < self.min_time_from_last_ref_frame_update_secs && budget.total_shots > 0
        {
            return FireDecision::ForceRefresh(RefreshCause::TooSoonAfterRefresh);
        }

        if budget.shots_since_refresh >= self.max_shots {
            return FireDecision::ForceRefresh(RefreshCause::ShotBudgetExhausted);
        }

        if debugging {
            return FireDecision::Hold(HoldReason::DebugSuppressed);
        }

        FireDecision::Fire
    }

    /// Runs the firing sequence around `command`, the pulse width in effect at fire
    /// time. Blocks for the full sweep. Hardware errors are logged, never retried,
    /// and never cut the sequence short: the trigger is always driven off at the end.
    pub fn fire(
        &self,
        image: &RgbImage,
        command: u32,
        target: (i64, i64),
        budget: &mut ShotBudget,
        peripherals: &mut Peripherals,
        clock: &dyn Clock,
    ) -> ShotRecord {
        budget.total_shots += 1;
        budget.shots_since_refresh += 1;

        info!(
            "Shot {}/{} at X:{} Y:{}. Total shots: {}",
            budget.shots_since_refresh, self.max_shots, target.0, target.1, budget.total_shots
        );

        let evidence = mark_target(image, target);
        let image = match peripherals
            .storage
            .save(&evidence, &budget.total_shots.to_string())
        {
            Ok(path) => {
                info!("Saved trigger picture to {}", path.display());
                Ok(path)
            }
            Err(e) => {
                warn!("Could not save trigger picture: {e}");
                Err(e.to_string())
            }
        };

        if let Err(e) = peripherals.trigger.set(true) {
            warn!("Trigger on failed: {e}");
        }

        for _ in 0..self.sweep_repetitions {
            for position in [command + self.sweep, command.saturating_sub(self.sweep)] {
                if let Err(e) = peripherals.actuator.set_position(position) {
                    warn!("Sweep to {position}us failed: {e}");
                }
                clock.sleep(self.sweep_hold);
            }
        }

        if let Err(e) = peripherals.trigger.set(false) {
            warn!("Trigger off failed: {e}");
        }

        let forced_refresh = budget.shots_since_refresh >= self.max_shots;
        if forced_refresh {
            info!(
                "Max shot limit ({}) reached. Forcing reference frame update.",
                self.max_shots
            );
        }

        ShotRecord {
            shot_number: budget.shots_since_refresh,
            total_shots: budget.total_shots,
            target_x: target.0,
            target_y: target.1,
            image,
            forced_refresh,
        }
    }
}

/// A copy of `image` with a two pixel 40x40 green box centered on `target`.
fn mark_target(image: &RgbImage, target: (i64, i64)) -> RgbImage {
    let mut marked = image.clone();
    let left = target.0 as i32 - TARGET_BOX_HALF;
    let top = target.1 as i32 - TARGET_BOX_HALF;
    for inset in 0..2 {
        let side = (2 * (TARGET_BOX_HALF - inset)) as u32;
        let rect = Rect::at(left + inset, top + inset).of_size(side, side);
        draw_hollow_rect_mut(&mut marked, rect, TARGET_GREEN);
    }
    marked
}
