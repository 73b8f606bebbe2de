//! Offline re-rating of a recorded trip

use std::time::{Duration, Instant};

use time::OffsetDateTime;

use super::position::Fix;
use super::state::{MeterState, TripReceipt};
use super::tariff::Tariff;

/// Gaps longer than this are treated as a pause, in seconds
pub const DEFAULT_MAX_GAP_SECS: u64 = 300;

/// Runs recorded fixes through the meter, using fix timestamps as clock
pub struct TripReplay {
    pub tariff: Tariff,
    pub max_gap_secs: u64,
}

impl TripReplay {
    pub fn new(tariff: Tariff) -> Self {
        Self {
            tariff,
            max_gap_secs: DEFAULT_MAX_GAP_SECS,
        }
    }

    pub fn max_gap(&mut self, secs: u64) -> &mut Self {
        self.max_gap_secs = secs.max(1);

        self
    }

    /// Rate the trip; None when there is nothing to replay
    pub fn run(&self, mut fixes: Vec<Fix>) -> Option<TripReceipt> {
        fixes.sort_by_key(|f| f.time);

        let t0 = fixes.first()?.time;
        let origin = Instant::now();
        let at = |t: OffsetDateTime| origin + Duration::try_from(t - t0).unwrap_or_default();
        let max_gap = time::Duration::seconds(i64::try_from(self.max_gap_secs).unwrap_or(i64::MAX));

        let mut state = MeterState::new(self.tariff);
        state.start(at(t0), t0);

        let mut prev = t0;
        for fix in &fixes {
            if fix.time - prev > max_gap {
                state.pause(at(prev));
                state.start(at(fix.time), fix.time);
            }

            let epoch = state.running_epoch()?;
            state.tick(epoch, at(fix.time));
            state.accept_fix(epoch, fix);

            prev = fix.time;
        }

        state.stop(at(prev), prev)
    }
}
