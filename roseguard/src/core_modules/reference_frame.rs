// THEORY:
// The `ReferenceFrameManager` owns the background the detector differences
// against. A stale background is the main source of false positives (shadows
// move, clouds pass, the lawn dries), so the manager replaces it wholesale:
//
// - on the very first frame, when there is nothing to compare against;
// - when it is older than the configured age limit;
// - when the fire controller raised the force flag after an anomaly.
//
// A refresh also restarts the per-reference shot budget. The cycle that performs a
// refresh does no detection at all; the controller returns early so the new
// reference is never compared with itself.

use crate::core_modules::clock::whole_seconds_between;
use crate::core_modules::fire_control::ShotBudget;
use crate::core_modules::frame::Frame;
use std::time::Instant;

/// Why a reference frame is being replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// No reference frame exists yet.
    Initial,
    /// The reference frame is older than the configured limit.
    Expired,
    /// The force flag was raised by the fire controller.
    Forced,
}

/// When the reference frame was last replaced, and whether a replacement is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    pub ref_frame_time: Instant,
    pub force_refresh: bool,
}

pub struct ReferenceFrameManager {
    reference: Option<Frame>,
    schedule: RefreshSchedule,
    time_limit_secs: u64,
    refresh_count: u64,
}

impl ReferenceFrameManager {
    pub fn new(time_limit_secs: u64, now: Instant) -> Self {
        Self {
            reference: None,
            schedule: RefreshSchedule {
                ref_frame_time: now,
                force_refresh: false,
            },
            time_limit_secs,
            refresh_count: 0,
        }
    }

    /// The reason a refresh is due at `now`, if one is.
    pub fn refresh_reason(&self, now: Instant) -> Option<RefreshReason> {
        if self.reference.is_none() {
            Some(RefreshReason::Initial)
        } else if whole_seconds_between(self.schedule.ref_frame_time, now) > self.time_limit_secs {
            Some(RefreshReason::Expired)
        } else if self.schedule.force_refresh {
            Some(RefreshReason::Forced)
        } else {
            None
        }
    }

    pub fn should_refresh(&self, now: Instant) -> bool {
        self.refresh_reason(now).is_some()
    }

    /// Installs `frame` as the new reference and restarts the per-reference shot count.
    pub fn refresh(&mut self, frame: Frame, now: Instant, budget: &mut ShotBudget) {
        self.reference = Some(frame);
        self.schedule.ref_frame_time = now;
        self.schedule.force_refresh = false;
        budget.shots_since_refresh = 0;
        self.refresh_count += 1;
    }

    /// Requests a refresh on the next cycle.
    pub fn force_refresh(&mut self) {
        self.schedule.force_refresh = true;
    }

    pub fn reference(&self) -> Option<&Frame> {
        self.reference.as_ref()
    }

    pub fn schedule(&self) -> &RefreshSchedule {
        &self.schedule
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }
}
