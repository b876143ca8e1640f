// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Key/value settings and the geofencing snapshot derived from them.

use serde::{Deserialize, Serialize};

/// Raw setting document (`settings/{key}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Geofencing configuration read once per submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttendanceSettings {
    pub geofencing_enabled: bool,
    pub campus_latitude: f64,
    pub campus_longitude: f64,
    pub max_distance_meters: f64,
}

impl AttendanceSettings {
    pub const DEFAULT_CAMPUS_LATITUDE: f64 = -6.200000;
    pub const DEFAULT_CAMPUS_LONGITUDE: f64 = 106.816666;
    pub const DEFAULT_MAX_DISTANCE_METERS: f64 = 100.0;

    /// Settings with geofencing turned off.
    pub fn unrestricted() -> Self {
        Self {
            geofencing_enabled: false,
            ..Self::default()
        }
    }
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        Self {
            geofencing_enabled: true,
            campus_latitude: Self::DEFAULT_CAMPUS_LATITUDE,
            campus_longitude: Self::DEFAULT_CAMPUS_LONGITUDE,
            max_distance_meters: Self::DEFAULT_MAX_DISTANCE_METERS,
        }
    }
}
