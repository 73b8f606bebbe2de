//! Meter state machine

use std::fmt;
use std::time::Instant;

use geo::geometry::Point;
use gpx::Track;
use time::OffsetDateTime;
use tracing::{debug, info};

use super::clock::ClockAccumulator;
use super::position::Fix;
use super::tariff::Tariff;
use super::tracker::PositionTracker;

/// Lifecycle phase of the meter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Paused,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Paused => "paused",
        };

        f.write_str(label)
    }
}

/// Outcome of a lifecycle request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Started,
    Resumed,
    Paused,
    Stopped,
    /// The request has no effect in the current phase
    Ignored,
}

/// Read-only view handed to displays
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeterSnapshot {
    pub phase: Phase,
    pub estimated_fare: i64,
    pub elapsed_millis: u64,
    pub total_distance_meters: f64,
    pub current_speed_kmh: f64,
    pub last_position: Option<Point>,
}

/// Summary of a finished trip, captured right before the reset
#[derive(Clone, Debug)]
pub struct TripReceipt {
    pub started_at: OffsetDateTime,
    pub ended_at: OffsetDateTime,
    pub elapsed_millis: u64,
    pub total_distance_meters: f64,
    pub fare: i64,
    pub tariff: Tariff,
    pub route: Track,
}

/// Live meter aggregate.
///
/// Every running interval gets its own epoch; ticks and fixes carry the
/// epoch they were produced for and are dropped once it is stale.
#[derive(Clone, Debug)]
pub struct MeterState {
    phase: Phase,
    started_at: Option<OffsetDateTime>,
    clock: ClockAccumulator,
    tracker: PositionTracker,
    tariff: Tariff,
    epoch: u64,
}

impl MeterState {
    pub fn new(tariff: Tariff) -> Self {
        Self {
            phase: Phase::Idle,
            started_at: None,
            clock: ClockAccumulator::new(),
            tracker: PositionTracker::new(),
            tariff,
            epoch: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn tariff(&self) -> &Tariff {
        &self.tariff
    }

    pub fn started_at(&self) -> Option<OffsetDateTime> {
        self.started_at
    }

    /// Epoch of the current running interval, if any
    pub fn running_epoch(&self) -> Option<u64> {
        match self.phase {
            Phase::Running => Some(self.epoch),
            _ => None,
        }
    }

    /// Start a trip from idle or resume a paused one
    pub fn start(&mut self, now: Instant, wall: OffsetDateTime) -> Transition {
        let transition = match self.phase {
            Phase::Running => return Transition::Ignored,
            Phase::Idle => {
                self.clock.reset();
                self.tracker.reset();
                self.started_at = Some(wall);
                Transition::Started
            }
            Phase::Paused => Transition::Resumed,
        };

        self.epoch += 1;
        self.phase = Phase::Running;
        self.clock.resume(now);
        self.tracker.begin_segment();

        info!(epoch = self.epoch, ?transition, "Meter running");

        transition
    }

    pub fn pause(&mut self, now: Instant) -> Transition {
        if self.phase != Phase::Running {
            return Transition::Ignored;
        }

        self.epoch += 1;
        self.phase = Phase::Paused;
        self.clock.pause(now);

        info!(elapsed_ms = self.clock.elapsed_millis(), "Meter paused");

        Transition::Paused
    }

    /// End the trip and zero every accumulator.
    ///
    /// Returns the receipt of the finished trip, or None when idle.
    pub fn stop(&mut self, now: Instant, wall: OffsetDateTime) -> Option<TripReceipt> {
        if self.phase == Phase::Idle {
            return None;
        }

        if self.phase == Phase::Running {
            self.clock.pause(now);
        }

        let elapsed_millis = self.clock.elapsed_millis();
        let total_distance_meters = self.tracker.total_distance();
        let receipt = TripReceipt {
            started_at: self.started_at.unwrap_or(wall),
            ended_at: wall,
            elapsed_millis,
            total_distance_meters,
            fare: self.tariff.fare(elapsed_millis, total_distance_meters),
            tariff: self.tariff,
            route: self.tracker.build_track("trip"),
        };

        self.epoch += 1;
        self.phase = Phase::Idle;
        self.started_at = None;
        self.clock.reset();
        self.tracker.reset();

        info!(
            fare = receipt.fare,
            elapsed_ms = receipt.elapsed_millis,
            distance_m = receipt.total_distance_meters,
            "Meter stopped"
        );

        Some(receipt)
    }

    /// Clock tick for `epoch`. Returns false when the epoch is stale.
    pub fn tick(&mut self, epoch: u64, now: Instant) -> bool {
        if self.running_epoch() != Some(epoch) {
            debug!(epoch, current = self.epoch, "Dropping stale tick");
            return false;
        }

        self.clock.tick(now);

        true
    }

    /// Position fix for `epoch`. Returns false when the epoch is stale.
    pub fn accept_fix(&mut self, epoch: u64, fix: &Fix) -> bool {
        if self.running_epoch() != Some(epoch) {
            debug!(epoch, current = self.epoch, "Dropping stale fix");
            return false;
        }

        self.tracker.accept(fix);

        true
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.clock.elapsed_millis()
    }

    pub fn total_distance_meters(&self) -> f64 {
        self.tracker.total_distance()
    }

    /// Fare derived from the current accumulators
    pub fn estimated_fare(&self) -> i64 {
        self.tariff.fare(self.elapsed_millis(), self.total_distance_meters())
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            phase: self.phase,
            estimated_fare: self.estimated_fare(),
            elapsed_millis: self.elapsed_millis(),
            total_distance_meters: self.total_distance_meters(),
            current_speed_kmh: self.tracker.speed_kmh(),
            last_position: self.tracker.last_position(),
        }
    }

    /// Route recorded so far, one segment per running interval
    pub fn route(&self, name: &str) -> Track {
        self.tracker.build_track(name)
    }
}
