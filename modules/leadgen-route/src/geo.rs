use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Two points closer than this are the same place.
pub const COINCIDENT_MILES: f64 = 1e-6;

/// Haversine distance between two lat/lng points in miles.
pub fn haversine_distance_miles(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let to_rad = |deg: f64| deg * PI / 180.0;

    let dlat = to_rad(lat2 - lat1);
    let dlng = to_rad(lng2 - lng1);

    let a = (dlat / 2.0).sin().powi(2)
        + to_rad(lat1).cos() * to_rad(lat2).cos() * (dlng / 2.0).sin().powi(2);

    // Clamp: rounding can push `a` a hair past 1 for antipodal points.
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_MILES * c
}

/// Latitude/longitude in degrees. Not validated on construction; see `is_valid`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite, latitude within ±90, longitude within ±180.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    pub fn miles_to(&self, other: &Coordinate) -> f64 {
        haversine_distance_miles(self.lat, self.lng, other.lat, other.lng)
    }

    pub fn coincides_with(&self, other: &Coordinate) -> bool {
        self.miles_to(other) < COINCIDENT_MILES
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}
