//! Fare meter: clock, position tracker, tariff and lifecycle

pub mod clock;
pub mod controller;
pub mod distance;
pub mod format;
pub mod gpx;
pub mod position;
pub mod replay;
pub mod state;
pub mod tariff;
pub mod tracker;
