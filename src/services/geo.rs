// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Great-circle distance on a spherical Earth.

use geo::{Distance, HaversineMeasure, Point};

/// Spherical Earth radius used for geofencing.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

const EARTH: HaversineMeasure = HaversineMeasure::new(EARTH_RADIUS_METERS);

/// Haversine distance in meters between two latitude/longitude pairs.
///
/// Inputs are degrees and must already be range-checked by the caller.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    // geo points are (x = longitude, y = latitude)
    EARTH.distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}

/// Whether a latitude/longitude pair is within the valid WGS84 ranges.
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}
