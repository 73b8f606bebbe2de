//! Great-circle distance between fixes

use geo::geometry::Point;

/// Mean Earth radius used by the meter, in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two points (x = lng, y = lat, degrees)
pub fn haversine(from: Point, to: Point) -> f64 {
    let lat1 = from.y().to_radians();
    let lat2 = to.y().to_radians();
    let dlat = (to.y() - from.y()).to_radians();
    let dlng = (to.x() - from.x()).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}
