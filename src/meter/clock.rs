//! Running-time accumulator

use std::time::{Duration, Instant};

/// Tracks total running duration across pauses.
///
/// Time between `pause` and the next `resume` is never counted, so the
/// elapsed value continues from where it stopped instead of following the
/// wall clock since the first start.
#[derive(Clone, Debug, Default)]
pub struct ClockAccumulator {
    /// Running time of the intervals already closed by a pause
    banked: Duration,
    /// Start of the current running interval
    running_since: Option<Instant>,
    /// Last observed elapsed value
    elapsed: Duration,
}

impl ClockAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// Open a running interval at `now`; ignored when already running
    pub fn resume(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    /// Update the elapsed value from `now`. Never moves backwards.
    pub fn tick(&mut self, now: Instant) -> Duration {
        if let Some(since) = self.running_since {
            let current = self.banked + now.saturating_duration_since(since);
            if current > self.elapsed {
                self.elapsed = current;
            }
        }

        self.elapsed
    }

    /// Close the running interval at `now`, keeping the time run so far
    pub fn pause(&mut self, now: Instant) -> Duration {
        self.tick(now);
        self.banked = self.elapsed;
        self.running_since = None;

        self.elapsed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_millis(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}
