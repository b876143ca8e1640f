// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Task handler routes for Cloud Tasks callbacks.
//!
//! These endpoints are called by Cloud Tasks, not directly by users. The
//! queue header check is applied in routes/mod.rs.

use crate::services::enricher::EnrichOutcome;
use crate::services::tasks::{EnrichAddressPayload, ENRICH_ADDRESS_PATH};
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use std::sync::Arc;

/// Task handler routes (called by Cloud Tasks).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(ENRICH_ADDRESS_PATH, post(enrich_address))
}

/// Resolve the address of one attendance.
///
/// Only record-store failures return 500, which makes Cloud Tasks retry.
/// A failed lookup is final; the placeholder address stays.
async fn enrich_address(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EnrichAddressPayload>,
) -> StatusCode {
    tracing::info!(
        attendance_id = %payload.attendance_id,
        "Processing address enrichment from Cloud Task"
    );

    match state
        .enricher
        .enrich(&payload.attendance_id, payload.latitude, payload.longitude)
        .await
    {
        Ok(outcome) => {
            tracing::debug!(
                attendance_id = %payload.attendance_id,
                resolved = matches!(outcome, EnrichOutcome::Updated(_)),
                "Address enrichment task done"
            );
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(
                attendance_id = %payload.attendance_id,
                error = %e,
                "Address enrichment failed on record store"
            );
            // Return 500 to trigger Cloud Tasks retry
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
