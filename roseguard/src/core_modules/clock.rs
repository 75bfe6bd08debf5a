// THEORY:
// Every timing rule in the controller (dwell time, reference age, cooldown after a
// refresh) and the blocking holds inside the fire sequence go through a `Clock`.
// Production uses the monotonic system clock; tests swap in a clock they can wind
// forward, so a two-minute reference expiry is exercised without sleeping.

use std::time::{Duration, Instant};

/// Source of time and of the blocking sleep used while firing.
pub trait Clock: Send {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Monotonic wall-time clock backed by `Instant` and `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Whole seconds elapsed between `earlier` and `later`, truncated.
/// Returns zero if `later` precedes `earlier`.
pub fn whole_seconds_between(earlier: Instant, later: Instant) -> u64 {
    later.saturating_duration_since(earlier).as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_seconds_truncate() {
        let t0 = Instant::now();
        assert_eq!(whole_seconds_between(t0, t0 + Duration::from_millis(1999)), 1);
        assert_eq!(whole_seconds_between(t0, t0 + Duration::from_secs(121)), 121);
    }

    #[test]
    fn elapsed_seconds_never_negative() {
        let t0 = Instant::now();
        assert_eq!(whole_seconds_between(t0 + Duration::from_secs(5), t0), 0);
    }
}
