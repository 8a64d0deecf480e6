//! Cadence clocks.
use std::time::{Duration, Instant};

use crate::constants::NANOS_IN_SECOND;

/// Clock frequency, in hertz (per second)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    /// Rates above 1 GHz are clamped to a 1ns interval.
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos((NANOS_IN_SECOND / freq.0).max(1))
        }
    }
}

/// Fixed rate schedule, polled by the execution loop.
///
/// The clock keeps a marker for the next due cycle. Each elapsed cycle moves
/// the marker forward by exactly one interval, rather than to the current
/// time, so a loop that falls behind catches up with a burst of cycles
/// instead of drifting.
#[derive(Debug, Clone)]
pub(crate) struct Clock {
    interval: Duration,
    next: Instant,
}

impl Clock {
    /// Creates a new clock, with the first cycle due one interval after `start`.
    pub(crate) fn new(freq: Hz, start: Instant) -> Self {
        let interval = Duration::from(freq);
        Self {
            interval,
            next: start + interval,
        }
    }

    /// Checks whether a cycle has elapsed at time `now`, and consumes it.
    pub(crate) fn tick(&mut self, now: Instant) -> bool {
        if now >= self.next {
            self.next += self.interval;
            true
        } else {
            false
        }
    }

    /// Checks whether a cycle is owed at time `now`, without consuming it.
    pub(crate) fn is_due(&self, now: Instant) -> bool {
        now >= self.next
    }

    /// Time at which the next cycle is due.
    pub(crate) fn next_due(&self) -> Instant {
        self.next
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// Forgive owed cycles older than `max` before `now`.
    pub(crate) fn limit_backlog(&mut self, now: Instant, max: Duration) {
        if let Some(oldest) = now.checked_sub(max) {
            if self.next < oldest {
                self.next = oldest;
            }
        }
    }
}
