// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tests for the address enrichment task handler.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use class_companion::db::Database;
use class_companion::models::{Attendance, PLACEHOLDER_ADDRESS};
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{TestApp, TEST_ADDRESS};

fn enrich_request(queue_header: Option<&str>, attendance_id: &str) -> Request<Body> {
    let payload = json!({
        "attendance_id": attendance_id,
        "latitude": -6.2,
        "longitude": 106.816666
    });

    let mut builder = Request::builder()
        .method("POST")
        .uri("/tasks/enrich-address")
        .header("content-type", "application/json");
    if let Some(queue) = queue_header {
        builder = builder.header("x-cloudtasks-queuename", queue);
    }
    builder
        .body(Body::from(serde_json::to_string(&payload).unwrap()))
        .unwrap()
}

async fn seed_attendance(app: &TestApp) {
    app.db
        .insert_attendance(&Attendance {
            id: "3_42".to_string(),
            user_id: 42,
            session_id: 3,
            selfie_path: "selfies/x.jpg".to_string(),
            latitude: -6.2,
            longitude: 106.816666,
            address: PLACEHOLDER_ADDRESS.to_string(),
            face_detected: true,
            submitted_at: Utc::now(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_enrich_no_header_forbidden() {
    let app = common::create_test_app();
    seed_attendance(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(enrich_request(None, "3_42"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let stored = app.db.get_attendance("3_42").await.unwrap().unwrap();
    assert_eq!(stored.address, PLACEHOLDER_ADDRESS);
}

#[tokio::test]
async fn test_enrich_wrong_queue_forbidden() {
    let app = common::create_test_app();

    let response = app
        .router
        .oneshot(enrich_request(Some("activity-processing"), "3_42"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_enrich_updates_address_idempotently() {
    let app = common::create_test_app();
    seed_attendance(&app).await;

    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(enrich_request(Some("attendance-address"), "3_42"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let stored = app.db.get_attendance("3_42").await.unwrap().unwrap();
    assert_eq!(stored.address, TEST_ADDRESS);
}

#[tokio::test]
async fn test_enrich_missing_record_is_ok() {
    let app = common::create_test_app();

    let response = app
        .router
        .oneshot(enrich_request(Some("attendance-address"), "9_9"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.db.attendance_count(), 0);
}

#[tokio::test]
async fn test_enrich_geocoder_failure_keeps_placeholder() {
    let app = common::create_test_app_with_geocoder(None);
    seed_attendance(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(enrich_request(Some("attendance-address"), "3_42"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let stored = app.db.get_attendance("3_42").await.unwrap().unwrap();
    assert_eq!(stored.address, PLACEHOLDER_ADDRESS);
}

#[tokio::test]
async fn test_enrich_store_outage_requests_retry() {
    let app = common::create_test_app();
    seed_attendance(&app).await;
    app.db.set_unavailable(true);

    let response = app
        .router
        .oneshot(enrich_request(Some("attendance-address"), "3_42"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_deleted_record_not_resurrected() {
    let app = common::create_test_app();
    seed_attendance(&app).await;
    app.db.delete_attendance("3_42");

    let response = app
        .router
        .clone()
        .oneshot(enrich_request(Some("attendance-address"), "3_42"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.db.get_attendance("3_42").await.unwrap().is_none());
}
