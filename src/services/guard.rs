// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Attendance submission guard.
//!
//! A submission passes through an ordered list of pure checks; the first
//! failing check decides the rejection the client sees:
//!
//! 1. duplicate (one attendance per user and session)
//! 2. check-in window
//! 3. payload (selfie, coordinates, face flag)
//! 4. geofence, only when enabled
//!
//! Acceptance then stores the selfie, creates the record with a placeholder
//! address through an atomic conditional insert, and enqueues address
//! enrichment. The insert is what actually serializes concurrent submissions
//! for the same pair; the duplicate check only gives the early answer.

use crate::db::{Database, InsertOutcome};
use crate::error::AttendanceError;
use crate::models::{Attendance, AttendanceSession, AttendanceSettings, PLACEHOLDER_ADDRESS};
use crate::services::blob::{BlobMetadata, BlobStore};
use crate::services::geo::distance_meters;
use crate::services::payload::{validate_payload, SubmissionPayload, ValidPayload};
use crate::services::tasks::{EnrichAddressPayload, TaskQueue};
use crate::services::window::{window_state, WindowState};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

const ENQUEUE_ATTEMPTS: u32 = 3;
const ENQUEUE_BACKOFF: Duration = Duration::from_millis(100);

/// Everything the validation pipeline looks at, already loaded.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionContext<'a> {
    pub existing: Option<&'a Attendance>,
    pub session: &'a AttendanceSession,
    pub payload: &'a SubmissionPayload,
    pub settings: &'a AttendanceSettings,
    pub now: DateTime<Utc>,
}

/// Run the checks in order. `Ok` carries the validated payload.
pub fn evaluate(ctx: &SubmissionContext<'_>) -> Result<ValidPayload, AttendanceError> {
    check_duplicate(ctx.existing)?;
    check_window(ctx.session, ctx.now)?;
    let valid = validate_payload(ctx.payload)?;
    check_geofence(ctx.settings, valid.latitude, valid.longitude)?;
    Ok(valid)
}

pub fn check_duplicate(existing: Option<&Attendance>) -> Result<(), AttendanceError> {
    match existing {
        Some(_) => Err(AttendanceError::AlreadySubmitted),
        None => Ok(()),
    }
}

/// A window that opens in the future counts as not yet opened.
pub fn check_window(session: &AttendanceSession, now: DateTime<Utc>) -> Result<(), AttendanceError> {
    match window_state(session.attendance_open_at, now) {
        WindowState::Open { .. } => Ok(()),
        WindowState::NotOpened | WindowState::Pending => Err(AttendanceError::WindowNotOpened),
        WindowState::Expired => Err(AttendanceError::WindowExpired),
    }
}

/// Returns the computed distance, or `None` when geofencing is off and
/// nothing was computed. A distance equal to the radius is inside.
pub fn check_geofence(
    settings: &AttendanceSettings,
    latitude: f64,
    longitude: f64,
) -> Result<Option<f64>, AttendanceError> {
    if !settings.geofencing_enabled {
        return Ok(None);
    }

    let distance = distance_meters(
        latitude,
        longitude,
        settings.campus_latitude,
        settings.campus_longitude,
    );

    if distance > settings.max_distance_meters {
        return Err(AttendanceError::OutOfRange {
            distance_meters: distance,
            max_meters: settings.max_distance_meters,
        });
    }
    Ok(Some(distance))
}

/// What an accepted submission returns.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceSummary {
    pub id: String,
    pub session_label: String,
    pub submitted_at: DateTime<Utc>,
    pub address: String,
}

/// Validates and records attendance submissions.
#[derive(Clone)]
pub struct AttendanceGuard {
    db: Arc<dyn Database>,
    blobs: Arc<dyn BlobStore>,
    queue: Arc<dyn TaskQueue>,
}

impl AttendanceGuard {
    pub fn new(db: Arc<dyn Database>, blobs: Arc<dyn BlobStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { db, blobs, queue }
    }

    /// Validate and record one submission.
    ///
    /// `settings` is the snapshot the caller read for this request.
    pub async fn submit(
        &self,
        user_id: u64,
        session_id: u64,
        payload: &SubmissionPayload,
        settings: &AttendanceSettings,
        now: DateTime<Utc>,
    ) -> Result<AttendanceSummary, AttendanceError> {
        let session = self
            .db
            .get_session(session_id)
            .await?
            .ok_or(AttendanceError::SessionNotFound(session_id))?;
        let existing = self.db.find_attendance(user_id, session_id).await?;

        let ctx = SubmissionContext {
            existing: existing.as_ref(),
            session: &session,
            payload,
            settings,
            now,
        };
        let valid = evaluate(&ctx).inspect_err(|reason| {
            tracing::info!(
                user_id,
                session_id,
                reason = reason.code(),
                "Attendance rejected"
            );
        })?;

        self.accept(user_id, &session, valid, now).await
    }

    async fn accept(
        &self,
        user_id: u64,
        session: &AttendanceSession,
        valid: ValidPayload,
        now: DateTime<Utc>,
    ) -> Result<AttendanceSummary, AttendanceError> {
        let metadata = BlobMetadata {
            extension: valid.image.extension(),
            content_type: valid.image.content_type(),
        };
        let selfie_path = self.blobs.store(&valid.selfie, &metadata).await?;

        let attendance = Attendance {
            id: Attendance::document_id(user_id, session.id),
            user_id,
            session_id: session.id,
            selfie_path,
            latitude: valid.latitude,
            longitude: valid.longitude,
            address: PLACEHOLDER_ADDRESS.to_string(),
            face_detected: valid.face_detected,
            submitted_at: now,
        };

        let outcome = match self.db.insert_attendance(&attendance).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.discard_selfie(&attendance.selfie_path).await;
                return Err(e.into());
            }
        };

        if outcome == InsertOutcome::AlreadyExists {
            // Lost the race to a concurrent submission for the same pair
            tracing::info!(
                user_id,
                session_id = session.id,
                "Concurrent duplicate attendance rejected"
            );
            self.discard_selfie(&attendance.selfie_path).await;
            return Err(AttendanceError::AlreadySubmitted);
        }

        tracing::info!(
            user_id,
            session_id = session.id,
            attendance_id = %attendance.id,
            face_detected = attendance.face_detected,
            "Attendance recorded"
        );

        let task = EnrichAddressPayload {
            attendance_id: attendance.id.clone(),
            latitude: attendance.latitude,
            longitude: attendance.longitude,
        };
        self.enqueue_enrichment(task).await;

        Ok(AttendanceSummary {
            id: attendance.id,
            session_label: session.week_label.clone(),
            submitted_at: attendance.submitted_at,
            address: attendance.address,
        })
    }

    /// Enqueue with a short bounded backoff. A record that still misses its
    /// task afterwards keeps the placeholder until the unresolved-address
    /// sweep picks it up.
    async fn enqueue_enrichment(&self, task: EnrichAddressPayload) {
        let mut delay = ENQUEUE_BACKOFF;
        for attempt in 1..=ENQUEUE_ATTEMPTS {
            match self.queue.enqueue_address_enrichment(task.clone()).await {
                Ok(()) => return,
                Err(e) if attempt < ENQUEUE_ATTEMPTS => {
                    tracing::warn!(
                        attendance_id = %task.attendance_id,
                        attempt,
                        error = %e,
                        "Enqueue of address enrichment failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    tracing::error!(
                        attendance_id = %task.attendance_id,
                        error = %e,
                        "Failed to enqueue address enrichment"
                    );
                }
            }
        }
    }

    async fn discard_selfie(&self, path: &str) {
        if let Err(e) = self.blobs.delete(path).await {
            tracing::warn!(path, error = %e, "Failed to delete orphaned selfie");
        }
    }
}
