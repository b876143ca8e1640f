// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use class_companion::error::{AppError, AttendanceError};

mod common;

async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    (status, common::body_json(response).await)
}

#[test]
fn test_only_storage_failure_is_retryable() {
    assert!(AttendanceError::StorageFailure("timeout".to_string()).is_retryable());

    for err in [
        AttendanceError::AlreadySubmitted,
        AttendanceError::WindowNotOpened,
        AttendanceError::WindowExpired,
        AttendanceError::InvalidPayload(vec!["selfie".to_string()]),
        AttendanceError::OutOfRange {
            distance_meters: 500.0,
            max_meters: 100.0,
        },
        AttendanceError::SessionNotFound(3),
    ] {
        assert!(!err.is_retryable(), "{:?}", err);
    }
}

#[test]
fn test_database_error_converts_to_storage_failure() {
    let err: AttendanceError = AppError::Database("deadline exceeded".to_string()).into();
    assert_eq!(err.code(), "storage_failure");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_attendance_error_responses() {
    let cases = [
        (
            AttendanceError::AlreadySubmitted,
            StatusCode::CONFLICT,
            "already_submitted",
        ),
        (
            AttendanceError::WindowNotOpened,
            StatusCode::BAD_REQUEST,
            "window_not_opened",
        ),
        (
            AttendanceError::WindowExpired,
            StatusCode::BAD_REQUEST,
            "window_expired",
        ),
        (
            AttendanceError::SessionNotFound(9),
            StatusCode::NOT_FOUND,
            "session_not_found",
        ),
        (
            AttendanceError::StorageFailure("unavailable".to_string()),
            StatusCode::SERVICE_UNAVAILABLE,
            "storage_failure",
        ),
    ];

    for (err, status, code) in cases {
        let (actual_status, json) = render(err.into()).await;
        assert_eq!(actual_status, status);
        assert_eq!(json["error"], code);
        assert!(json.get("fields").is_none());
    }
}

#[tokio::test]
async fn test_out_of_range_message_has_distance() {
    let (status, json) = render(
        AttendanceError::OutOfRange {
            distance_meters: 512.4,
            max_meters: 100.0,
        }
        .into(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = json["message"].as_str().unwrap();
    assert!(message.contains("512m"), "{}", message);
    assert!(message.contains("100m"), "{}", message);
}

#[tokio::test]
async fn test_invalid_payload_lists_fields() {
    let (status, json) = render(
        AttendanceError::InvalidPayload(vec!["selfie".to_string(), "longitude".to_string()]).into(),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["fields"], serde_json::json!(["selfie", "longitude"]));
}

#[tokio::test]
async fn test_storage_details_not_leaked() {
    let (_, json) = render(AttendanceError::StorageFailure("grpc: secret-host:443".to_string()).into()).await;
    assert!(!json["message"].as_str().unwrap().contains("secret-host"));

    let (status, json) = render(AppError::Database("grpc: secret-host:443".to_string())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!json["message"].as_str().unwrap().contains("secret-host"));
}
