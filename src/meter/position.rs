//! Position fix definition

use geo::geometry::Point;
use time::OffsetDateTime;

/// Single position sample reported by a location source
#[derive(Clone, Debug, PartialEq)]
pub struct Fix {
    /// Longitude on `x`, latitude on `y`, both in degrees
    pub coordinates: Point,
    pub time: OffsetDateTime,
    /// Reported speed in meters per second
    pub speed: Option<f64>,
    pub precision: Option<f64>,
    pub altitude: Option<f64>,
}

impl Fix {
    pub fn basic(coordinates: Point, time: OffsetDateTime) -> Self {
        Self {
            coordinates,
            time,
            speed: None,
            precision: None,
            altitude: None,
        }
    }

    /// Fix taken now at the latitude/longitude pair
    pub fn at(lat: f64, lng: f64) -> Self {
        Self::basic(Point::new(lng, lat), OffsetDateTime::now_utc())
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);

        self
    }

    pub fn lat(&self) -> f64 {
        self.coordinates.y()
    }

    pub fn lng(&self) -> f64 {
        self.coordinates.x()
    }

    /// Coordinates are usable only when both are finite numbers
    pub fn is_valid(&self) -> bool {
        self.lat().is_finite() && self.lng().is_finite()
    }

    /// Reported speed converted to km/h, zero when missing or nonsense
    pub fn speed_kmh(&self) -> f64 {
        match self.speed {
            Some(mps) if mps.is_finite() && mps >= 0.0 => mps * 3.6,
            _ => 0.0,
        }
    }
}
