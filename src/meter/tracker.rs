//! Position tracker: distance accumulation and route recording

use geo::geometry::Point;
use gpx::{Track, TrackSegment, Waypoint};
use tracing::warn;

use super::distance::haversine;
use super::position::Fix;

/// Accumulates traveled distance from consecutive fixes
#[derive(Clone, Debug, Default)]
pub struct PositionTracker {
    last_position: Option<Point>,
    total_distance: f64,
    speed_kmh: f64,
    route: Vec<Vec<Fix>>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one fix. Returns false when the fix was rejected.
    ///
    /// The first fix after `begin_segment` only seeds the last position.
    pub fn accept(&mut self, fix: &Fix) -> bool {
        if !fix.is_valid() {
            warn!(lat = fix.lat(), lng = fix.lng(), "Dropping fix with invalid coordinates");
            return false;
        }

        if let Some(last) = self.last_position {
            self.total_distance += haversine(last, fix.coordinates);
        }

        self.last_position = Some(fix.coordinates);
        self.speed_kmh = fix.speed_kmh();

        if self.route.is_empty() {
            self.route.push(vec![]);
        }
        if let Some(seg) = self.route.last_mut() {
            seg.push(fix.clone());
        }

        true
    }

    /// Start a new running interval: the next fix seeds again and the
    /// route gets a fresh segment
    pub fn begin_segment(&mut self) {
        self.last_position = None;

        if self.route.last().map_or(true, |seg| !seg.is_empty()) {
            self.route.push(vec![]);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn last_position(&self) -> Option<Point> {
        self.last_position
    }

    /// Traveled distance in meters
    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed_kmh
    }

    /// Route points grouped by running interval
    pub fn route(&self) -> impl Iterator<Item = &[Fix]> {
        self.route.iter().map(|seg| seg.as_slice()).filter(|seg| !seg.is_empty())
    }

    /// Build a GPX track with one segment per running interval
    pub fn build_track(&self, name: &str) -> Track {
        let mut track = Track::new();
        track.name = Some(name.to_string());
        track.description = Some(format!("{:.0} m traveled", self.total_distance));

        for fixes in self.route() {
            let mut tseg = TrackSegment::new();

            for fix in fixes {
                let mut wp = Waypoint::new(fix.coordinates);

                wp.time = Some(fix.time.into());
                wp.elevation = fix.altitude;
                wp.speed = fix.speed;

                tseg.points.push(wp);
            }

            track.segments.push(tseg);
        }

        track
    }
}
