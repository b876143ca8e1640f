// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Address enrichment for stored attendances.
//!
//! Runs from a background task, never from the submission request. The
//! record is looked up by id on every run, so a task delivered twice (or
//! after the record was deleted) is harmless.

use crate::db::Database;
use crate::error::AppError;
use crate::services::geocoding::{GeocodeError, Geocoder};
use std::sync::Arc;
use std::time::Duration;

/// What one enrichment run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// Address overwritten with the geocoded value.
    Updated(String),
    /// The attendance no longer exists; nothing to do.
    RecordMissing,
    /// Geocoding failed or returned nothing; the placeholder stays.
    Unresolved,
}

#[derive(Clone)]
pub struct AddressEnricher {
    db: Arc<dyn Database>,
    geocoder: Arc<dyn Geocoder>,
    timeout: Duration,
}

impl AddressEnricher {
    pub fn new(db: Arc<dyn Database>, geocoder: Arc<dyn Geocoder>, timeout: Duration) -> Self {
        Self {
            db,
            geocoder,
            timeout,
        }
    }

    /// Resolve and store the address for one attendance.
    ///
    /// Only record-store failures are errors; the caller may retry those.
    pub async fn enrich(
        &self,
        attendance_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<EnrichOutcome, AppError> {
        if self.db.get_attendance(attendance_id).await?.is_none() {
            tracing::info!(attendance_id, "Attendance gone before enrichment, skipping");
            return Ok(EnrichOutcome::RecordMissing);
        }

        let lookup = tokio::time::timeout(
            self.timeout,
            self.geocoder.reverse_geocode(latitude, longitude),
        )
        .await
        .unwrap_or(Err(GeocodeError::Timeout));

        let address = match lookup {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!(
                    attendance_id,
                    latitude,
                    longitude,
                    error = %e,
                    "Address enrichment failed, keeping placeholder"
                );
                return Ok(EnrichOutcome::Unresolved);
            }
        };

        // Deleted between lookup and write
        if !self
            .db
            .update_attendance_address(attendance_id, &address)
            .await?
        {
            tracing::info!(attendance_id, "Attendance deleted during enrichment");
            return Ok(EnrichOutcome::RecordMissing);
        }

        tracing::info!(attendance_id, address = %address, "Attendance address resolved");
        Ok(EnrichOutcome::Updated(address))
    }
}
