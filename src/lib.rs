//! tripmeter - Real-time driving fare meter fed by live position fixes

pub mod config;
mod meter;
pub mod sources;

pub use config::{ConfigError, MeterConfig};
pub use meter::clock::ClockAccumulator;
pub use meter::controller::{Hook, Meter, DEFAULT_TICK_INTERVAL};
pub use meter::distance::{haversine, EARTH_RADIUS_METERS};
pub use meter::format;
pub use meter::gpx::GpxGenerator;
pub use meter::position::Fix;
pub use meter::replay::TripReplay;
pub use meter::state::{MeterSnapshot, MeterState, Phase, Transition, TripReceipt};
pub use meter::tariff::Tariff;
pub use meter::tracker::PositionTracker;
