// THEORY:
// The `tracker` module gives the controller its short-term memory. The detector
// only knows where motion is in the current frame; the `TargetTracker` remembers
// where it was last frame and decides whether the target is moving or holding
// still.
//
// Key principles:
// 1.  **Stillness, not presence**: a target is "Acquired" only while consecutive
//     centers stay within the movement threshold (Manhattan distance). A deer
//     walking across the lawn is merely "Tracking".
// 2.  **Dwell timer**: `acquired_since` starts at the moment stillness begins,
//     i.e. on the transition into Acquired, never at first detection. Any
//     movement or disappearance clears it.
// 3.  **Single target**: there is no data association; the largest region each
//     frame is the target, and its center always becomes the new last position.

use crate::core_modules::detection::Detection;
use std::time::Instant;

/// Acquisition state of the (single) target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Nothing is moving in the scene.
    #[default]
    Unoccupied,
    /// A target is present but moved more than the threshold since last frame.
    Tracking,
    /// A target is present and holding still.
    Acquired,
}

impl TrackState {
    pub fn label(&self) -> &'static str {
        match self {
            TrackState::Unoccupied => "Unoccupied",
            TrackState::Tracking => "Tracking",
            TrackState::Acquired => "Acquired",
        }
    }
}

/// Maintains the Unoccupied / Tracking / Acquired state machine across frames.
#[derive(Debug, Clone)]
pub struct TargetTracker {
    state: TrackState,
    acquired_since: Option<Instant>,
    last_x: i64,
    last_y: i64,
    movement_threshold: u64,
}

impl TargetTracker {
    pub fn new(movement_threshold: u32) -> Self {
        Self {
            state: TrackState::Unoccupied,
            acquired_since: None,
            last_x: 0,
            last_y: 0,
            movement_threshold: movement_threshold as u64,
        }
    }

    /// Advances the state machine with this frame's detection.
    pub fn update(&mut self, detection: Option<&Detection>, now: Instant) -> TrackState {
        let Some(detection) = detection else {
            self.state = TrackState::Unoccupied;
            self.acquired_since = None;
            return self.state;
        };

        let movement = detection.manhattan_distance_to(self.last_x, self.last_y);
        if movement < self.movement_threshold {
            if self.state != TrackState::Acquired {
                self.acquired_since = Some(now);
            }
            self.state = TrackState::Acquired;
        } else {
            self.state = TrackState::Tracking;
            self.acquired_since = None;
        }

        self.last_x = detection.center_x as i64;
        self.last_y = detection.center_y as i64;
        self.state
    }

    /// Clears the dwell timer without leaving the current state.
    pub fn reset_dwell(&mut self) {
        self.acquired_since = None;
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn acquired_since(&self) -> Option<Instant> {
        self.acquired_since
    }

    pub fn last_position(&self) -> (i64, i64) {
        (self.last_x, self.last_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(x: u32, y: u32) -> Detection {
        Detection::from_bounds(x, y, 0, 0, 1000.0)
    }

    #[test]
    fn starts_unoccupied_at_origin() {
        let tracker = TargetTracker::new(50);
        assert_eq!(tracker.state(), TrackState::Unoccupied);
        assert_eq!(tracker.acquired_since(), None);
        assert_eq!(tracker.last_position(), (0, 0));
    }

    #[test]
    fn first_sighting_far_from_origin_is_tracking() {
        let t0 = Instant::now();
        let mut tracker = TargetTracker::new(50);
        assert_eq!(tracker.update(Some(&at(300, 200)), t0), TrackState::Tracking);
        assert_eq!(tracker.acquired_since(), None);
        assert_eq!(tracker.last_position(), (300, 200));
    }

    #[test]
    fn dwell_timer_starts_when_stillness_begins() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(100);
        let t2 = t0 + Duration::from_millis(200);
        let mut tracker = TargetTracker::new(50);

        tracker.update(Some(&at(300, 200)), t0);
        assert_eq!(tracker.update(Some(&at(310, 205)), t1), TrackState::Acquired);
        assert_eq!(tracker.acquired_since(), Some(t1));

        // Staying still keeps the first start time.
        assert_eq!(tracker.update(Some(&at(305, 210)), t2), TrackState::Acquired);
        assert_eq!(tracker.acquired_since(), Some(t1));
    }

    #[test]
    fn movement_at_threshold_resets_dwell() {
        let t0 = Instant::now();
        let mut tracker = TargetTracker::new(50);
        tracker.update(Some(&at(300, 200)), t0);
        tracker.update(Some(&at(300, 200)), t0);
        assert_eq!(tracker.state(), TrackState::Acquired);

        // 30 + 20 = 50 is not below the threshold.
        assert_eq!(
            tracker.update(Some(&at(330, 220)), t0 + Duration::from_secs(1)),
            TrackState::Tracking
        );
        assert_eq!(tracker.acquired_since(), None);
    }

    #[test]
    fn losing_the_target_clears_everything_but_position() {
        let t0 = Instant::now();
        let mut tracker = TargetTracker::new(50);
        tracker.update(Some(&at(100, 100)), t0);
        tracker.update(Some(&at(100, 100)), t0);

        assert_eq!(tracker.update(None, t0), TrackState::Unoccupied);
        assert_eq!(tracker.acquired_since(), None);
        assert_eq!(tracker.last_position(), (100, 100));
    }

    #[test]
    fn oscillating_target_never_acquires() {
        let t0 = Instant::now();
        let mut tracker = TargetTracker::new(50);
        for i in 0..40u64 {
            let x = if i % 2 == 0 { 300 } else { 360 };
            let state = tracker.update(Some(&at(x, 200)), t0 + Duration::from_millis(100 * i));
            assert_eq!(state, TrackState::Tracking);
        }
    }

    #[test]
    fn reset_dwell_keeps_state() {
        let t0 = Instant::now();
        let mut tracker = TargetTracker::new(50);
        tracker.update(Some(&at(0, 0)), t0);
        tracker.reset_dwell();
        assert_eq!(tracker.state(), TrackState::Acquired);
        assert_eq!(tracker.acquired_since(), None);

        // Still Acquired, so further stillness does not restart the timer.
        tracker.update(Some(&at(0, 0)), t0 + Duration::from_secs(3));
        assert_eq!(tracker.acquired_since(), None);
    }
}
