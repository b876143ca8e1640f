// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated students.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Attendance, AttendanceSession, AttendanceSettings, Material};
use crate::services::payload::{
    SelfieUpload, SubmissionPayload, FIELD_FACE_DETECTED, FIELD_LATITUDE, FIELD_LONGITUDE,
    FIELD_SELFIE,
};
use crate::services::window;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Request body ceiling for the attend endpoint. Larger than the selfie
/// limit so an oversized selfie is reported as a field error.
pub const MAX_SUBMISSION_BODY_BYTES: usize = 8 * 1024 * 1024;

const SESSION_LOOKUP_CONCURRENCY: usize = 8;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/{session_id}", get(get_session))
        .route(
            "/api/sessions/{session_id}/attend",
            post(submit_attendance).layer(DefaultBodyLimit::max(MAX_SUBMISSION_BODY_BYTES)),
        )
        .route("/api/materials", get(list_materials))
        .route("/api/my-attendances", get(my_attendances))
        .route("/api/attendance-settings", get(attendance_settings))
}

// ─── Submission ──────────────────────────────────────────────

/// Accepted submission.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AttendanceReceipt {
    pub id: String,
    pub session_label: String,
    pub submitted_at: String,
    pub address: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubmitAttendanceResponse {
    pub message: String,
    pub data: AttendanceReceipt,
}

/// Record attendance for the caller.
async fn submit_attendance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<u64>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitAttendanceResponse>)> {
    let payload = read_submission(multipart).await;
    let settings = state.settings.snapshot().await?;
    let now = Utc::now();

    let summary = state
        .guard
        .submit(user.user_id, session_id, &payload, &settings, now)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitAttendanceResponse {
            message: "Attendance recorded".to_string(),
            data: AttendanceReceipt {
                id: summary.id,
                session_label: summary.session_label,
                submitted_at: format_utc_rfc3339(summary.submitted_at),
                address: summary.address,
            },
        }),
    ))
}

/// Collect the multipart fields. Unknown fields are ignored; a later
/// duplicate of a field replaces the earlier one.
///
/// Read failures never reject the request here. A body over the size limit
/// or a broken stream marks the selfie unreadable and stops reading, so the
/// duplicate and window checks still get to answer first.
async fn read_submission(mut multipart: Multipart) -> SubmissionPayload {
    let mut payload = SubmissionPayload::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                mark_selfie_unreadable(&mut payload, &e);
                break;
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        let value = match name.as_str() {
            FIELD_SELFIE => match field.bytes().await {
                Ok(bytes) => {
                    payload.selfie = Some(SelfieUpload::Received(bytes));
                    continue;
                }
                Err(e) => {
                    payload.selfie = None;
                    mark_selfie_unreadable(&mut payload, &e);
                    break;
                }
            },
            FIELD_LATITUDE | FIELD_LONGITUDE | FIELD_FACE_DETECTED => match field.text().await {
                Ok(value) => value,
                Err(e) => {
                    mark_selfie_unreadable(&mut payload, &e);
                    break;
                }
            },
            _ => {
                tracing::debug!(field = %name, "Ignoring unknown multipart field");
                continue;
            }
        };

        match name.as_str() {
            FIELD_LATITUDE => payload.latitude = Some(value),
            FIELD_LONGITUDE => payload.longitude = Some(value),
            _ => payload.face_detected = Some(value),
        }
    }

    payload
}

fn mark_selfie_unreadable(payload: &mut SubmissionPayload, err: &MultipartError) {
    tracing::debug!(
        status = %err.status(),
        error = %err,
        "Multipart body cut short"
    );
    if payload.selfie.is_none() {
        payload.selfie = Some(SelfieUpload::Unreadable);
    }
}

// ─── Sessions ────────────────────────────────────────────────

/// A session as seen by the calling student.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub week_label: String,
    /// YYYY-MM-DD
    pub session_date: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub material_id: Option<u64>,
    /// Set only when the linked material is published
    pub material: Option<MaterialSummary>,
    pub attendance_open_at: Option<String>,
    pub is_open: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub remaining_minutes: Option<i64>,
    pub has_attended: bool,
}

/// The linked material, as embedded in a session.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MaterialSummary {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub title: String,
    pub file_path: Option<String>,
    pub link: Option<String>,
}

impl From<&Material> for MaterialSummary {
    fn from(material: &Material) -> Self {
        Self {
            id: material.id,
            title: material.title.clone(),
            file_path: material.file_path.clone(),
            link: material.link.clone(),
        }
    }
}

impl SessionResponse {
    fn new(
        session: &AttendanceSession,
        material: Option<&Material>,
        now: DateTime<Utc>,
        has_attended: bool,
    ) -> Self {
        Self {
            id: session.id,
            week_label: session.week_label.clone(),
            session_date: session.session_date.format("%Y-%m-%d").to_string(),
            material_id: session.material_id,
            material: material.map(MaterialSummary::from),
            attendance_open_at: session.attendance_open_at.map(format_utc_rfc3339),
            is_open: window::is_open(session, now),
            remaining_minutes: window::remaining_minutes(session, now),
            has_attended,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionResponse>,
}

/// All sessions, newest first.
async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SessionsResponse>> {
    let (sessions, attendances, materials) = tokio::try_join!(
        state.db.list_sessions(),
        state.db.list_attendances_for_user(user.user_id),
        state.db.list_published_materials(),
    )?;

    let attended: HashSet<u64> = attendances.iter().map(|a| a.session_id).collect();
    let materials: HashMap<u64, Material> = materials.into_iter().map(|m| (m.id, m)).collect();
    let now = Utc::now();

    Ok(Json(SessionsResponse {
        sessions: sessions
            .iter()
            .map(|s| {
                let material = s.material_id.and_then(|id| materials.get(&id));
                SessionResponse::new(s, material, now, attended.contains(&s.id))
            })
            .collect(),
    }))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<u64>,
) -> Result<Json<SessionResponse>> {
    let (session, attendance) = tokio::try_join!(
        state.db.get_session(session_id),
        state.db.find_attendance(user.user_id, session_id),
    )?;
    let session =
        session.ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))?;

    let material = match session.material_id {
        Some(id) => state.db.get_material(id).await?.filter(|m| m.is_published),
        None => None,
    };

    Ok(Json(SessionResponse::new(
        &session,
        material.as_ref(),
        Utc::now(),
        attendance.is_some(),
    )))
}

// ─── Materials ───────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MaterialResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub link: Option<String>,
    pub created_at: String,
}

impl From<Material> for MaterialResponse {
    fn from(material: Material) -> Self {
        Self {
            id: material.id,
            title: material.title,
            description: material.description,
            file_path: material.file_path,
            link: material.link,
            created_at: format_utc_rfc3339(material.created_at),
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MaterialsResponse {
    pub materials: Vec<MaterialResponse>,
}

/// Published course materials, newest first.
async fn list_materials(State(state): State<Arc<AppState>>) -> Result<Json<MaterialsResponse>> {
    let materials = state.db.list_published_materials().await?;
    Ok(Json(MaterialsResponse {
        materials: materials.into_iter().map(MaterialResponse::from).collect(),
    }))
}

// ─── Attendance History ──────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MyAttendanceResponse {
    pub id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub session_id: u64,
    /// `None` if the session has since been deleted
    pub session_label: Option<String>,
    pub session_date: Option<String>,
    pub submitted_at: String,
    pub address: String,
    pub address_resolved: bool,
    pub face_detected: bool,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MyAttendancesResponse {
    pub attendances: Vec<MyAttendanceResponse>,
}

/// The caller's attendances, newest first.
async fn my_attendances(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MyAttendancesResponse>> {
    let attendances = state.db.list_attendances_for_user(user.user_id).await?;

    let session_ids: HashSet<u64> = attendances.iter().map(|a| a.session_id).collect();
    let sessions: HashMap<u64, AttendanceSession> = stream::iter(session_ids)
        .map(|id| {
            let db = state.db.clone();
            async move { db.get_session(id).await }
        })
        .buffer_unordered(SESSION_LOOKUP_CONCURRENCY)
        .try_filter_map(|session| async move { Ok(session.map(|s| (s.id, s))) })
        .try_collect()
        .await?;

    Ok(Json(MyAttendancesResponse {
        attendances: attendances
            .iter()
            .map(|a| attendance_view(a, sessions.get(&a.session_id)))
            .collect(),
    }))
}

fn attendance_view(
    attendance: &Attendance,
    session: Option<&AttendanceSession>,
) -> MyAttendanceResponse {
    MyAttendanceResponse {
        id: attendance.id.clone(),
        session_id: attendance.session_id,
        session_label: session.map(|s| s.week_label.clone()),
        session_date: session.map(|s| s.session_date.format("%Y-%m-%d").to_string()),
        submitted_at: format_utc_rfc3339(attendance.submitted_at),
        address: attendance.address.clone(),
        address_resolved: attendance.has_resolved_address(),
        face_detected: attendance.face_detected,
    }
}

// ─── Settings ────────────────────────────────────────────────

/// Geofencing configuration, so the client can pre-check its position.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AttendanceSettingsResponse {
    pub geofencing_enabled: bool,
    pub campus_latitude: f64,
    pub campus_longitude: f64,
    pub max_distance_meters: f64,
}

impl From<AttendanceSettings> for AttendanceSettingsResponse {
    fn from(settings: AttendanceSettings) -> Self {
        Self {
            geofencing_enabled: settings.geofencing_enabled,
            campus_latitude: settings.campus_latitude,
            campus_longitude: settings.campus_longitude,
            max_distance_meters: settings.max_distance_meters,
        }
    }
}

async fn attendance_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AttendanceSettingsResponse>> {
    Ok(Json(state.settings.snapshot().await?.into()))
}
