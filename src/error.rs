// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Why a submission was not recorded.
///
/// Everything except `StorageFailure` is terminal for the request; the
/// client has to resubmit or accept the rejection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttendanceError {
    #[error("Attendance already submitted for this session")]
    AlreadySubmitted,

    #[error("Attendance has not been opened for this session")]
    WindowNotOpened,

    #[error("Attendance window has closed (maximum 15 minutes)")]
    WindowExpired,

    #[error("Invalid submission: {}", .0.join(", "))]
    InvalidPayload(Vec<String>),

    #[error("Location is outside the campus range ({distance_meters:.0}m away, maximum {max_meters}m)")]
    OutOfRange { distance_meters: f64, max_meters: f64 },

    #[error("Session not found: {0}")]
    SessionNotFound(u64),

    #[error("Storage unavailable: {0}")]
    StorageFailure(String),
}

impl AttendanceError {
    /// Machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            AttendanceError::AlreadySubmitted => "already_submitted",
            AttendanceError::WindowNotOpened => "window_not_opened",
            AttendanceError::WindowExpired => "window_expired",
            AttendanceError::InvalidPayload(_) => "invalid_payload",
            AttendanceError::OutOfRange { .. } => "out_of_range",
            AttendanceError::SessionNotFound(_) => "session_not_found",
            AttendanceError::StorageFailure(_) => "storage_failure",
        }
    }

    /// Only storage failures are worth retrying the same request for.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AttendanceError::StorageFailure(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            AttendanceError::AlreadySubmitted => StatusCode::CONFLICT,
            AttendanceError::WindowNotOpened
            | AttendanceError::WindowExpired
            | AttendanceError::OutOfRange { .. } => StatusCode::BAD_REQUEST,
            AttendanceError::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AttendanceError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AttendanceError::StorageFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<AppError> for AttendanceError {
    fn from(err: AppError) -> Self {
        AttendanceError::StorageFailure(err.to_string())
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Attendance(#[from] AttendanceError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<String>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message, fields) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string(), None),
            AppError::Attendance(err) => {
                if let AttendanceError::StorageFailure(msg) = err {
                    tracing::error!(error = %msg, "Attendance storage failure");
                }
                let fields = match err {
                    AttendanceError::InvalidPayload(fields) => Some(fields.clone()),
                    _ => None,
                };
                // Storage details stay in the logs
                let message = if err.is_retryable() {
                    "Storage is temporarily unavailable, please retry".to_string()
                } else {
                    err.to_string()
                };
                (err.status(), err.code(), message, fields)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "database_error",
                    "Database is temporarily unavailable".to_string(),
                    None,
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message,
            fields,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
