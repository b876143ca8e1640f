// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed access to the string key/value settings collection.

use crate::db::Database;
use crate::error::AppError;
use crate::models::AttendanceSettings;
use std::sync::Arc;

pub const GEOFENCING_ENABLED: &str = "geofencing_enabled";
pub const CAMPUS_LATITUDE: &str = "campus_latitude";
pub const CAMPUS_LONGITUDE: &str = "campus_longitude";
pub const MAX_DISTANCE_METERS: &str = "max_distance_meters";

/// Settings store with typed accessors.
///
/// Typed getters fall back to the caller's default when the key is absent or
/// the stored value does not parse.
#[derive(Clone)]
pub struct SettingsService {
    db: Arc<dyn Database>,
}

impl SettingsService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.db.get_setting(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.db.set_setting(key, value).await?;
        tracing::info!(key, value, "Setting updated");
        Ok(())
    }

    pub async fn get_bool(&self, key: &str, default: bool) -> Result<bool, AppError> {
        Ok(self
            .get(key)
            .await?
            .and_then(|v| parse_bool(&v))
            .unwrap_or(default))
    }

    pub async fn get_float(&self, key: &str, default: f64) -> Result<f64, AppError> {
        Ok(self
            .get(key)
            .await?
            .and_then(|v| parse_float(&v))
            .unwrap_or(default))
    }

    /// Read the geofencing configuration for one submission.
    pub async fn snapshot(&self) -> Result<AttendanceSettings, AppError> {
        let (geofencing_enabled, campus_latitude, campus_longitude, max_distance_meters) = tokio::try_join!(
            self.get_bool(GEOFENCING_ENABLED, true),
            self.get_float(CAMPUS_LATITUDE, AttendanceSettings::DEFAULT_CAMPUS_LATITUDE),
            self.get_float(CAMPUS_LONGITUDE, AttendanceSettings::DEFAULT_CAMPUS_LONGITUDE),
            self.get_float(
                MAX_DISTANCE_METERS,
                AttendanceSettings::DEFAULT_MAX_DISTANCE_METERS
            ),
        )?;

        Ok(AttendanceSettings {
            geofencing_enabled,
            campus_latitude,
            campus_longitude,
            max_distance_meters,
        })
    }

    /// Persist a full geofencing configuration.
    pub async fn save(&self, settings: &AttendanceSettings) -> Result<(), AppError> {
        self.set(
            GEOFENCING_ENABLED,
            if settings.geofencing_enabled {
                "true"
            } else {
                "false"
            },
        )
        .await?;
        self.set(CAMPUS_LATITUDE, &settings.campus_latitude.to_string())
            .await?;
        self.set(CAMPUS_LONGITUDE, &settings.campus_longitude.to_string())
            .await?;
        self.set(
            MAX_DISTANCE_METERS,
            &settings.max_distance_meters.to_string(),
        )
        .await
    }
}

/// Lenient boolean parsing; `None` means "use the default".
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Finite float parsing; `None` means "use the default".
pub fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
