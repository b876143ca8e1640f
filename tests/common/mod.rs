// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use class_companion::config::Config;
use class_companion::db::{Database, FirestoreDb, MemoryDb};
use class_companion::models::AttendanceSession;
use class_companion::routes::create_router;
use class_companion::services::{
    AddressEnricher, AttendanceGuard, GeocodeError, Geocoder, MemoryBlobStore, RecordingQueue,
    SettingsService,
};
use class_companion::AppState;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Campus coordinates used by the default settings.
#[allow(dead_code)]
pub const CAMPUS_LAT: f64 = -6.2;
#[allow(dead_code)]
pub const CAMPUS_LON: f64 = 106.816666;

/// Address returned by the test geocoder.
#[allow(dead_code)]
pub const TEST_ADDRESS: &str = "Jalan Jenderal Sudirman, Jakarta Pusat, Indonesia";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Geocoder that answers immediately, or fails when `address` is `None`.
pub struct StaticGeocoder {
    pub address: Option<String>,
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn reverse_geocode(&self, _lat: f64, _lon: f64) -> Result<String, GeocodeError> {
        self.address.clone().ok_or(GeocodeError::Status(503))
    }
}

/// App wired to in-memory collaborators, with handles to inspect them.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub db: MemoryDb,
    pub blobs: MemoryBlobStore,
    pub queue: RecordingQueue,
}

/// Create a test app whose geocoder resolves every position.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_geocoder(Some(TEST_ADDRESS))
}

#[allow(dead_code)]
pub fn create_test_app_with_geocoder(address: Option<&str>) -> TestApp {
    let config = Config::test_default();
    let db = MemoryDb::new();
    let blobs = MemoryBlobStore::new();
    let queue = RecordingQueue::new();

    let shared_db: Arc<dyn Database> = Arc::new(db.clone());
    let geocoder = Arc::new(StaticGeocoder {
        address: address.map(str::to_string),
    });

    let state = Arc::new(AppState {
        config,
        db: shared_db.clone(),
        settings: SettingsService::new(shared_db.clone()),
        guard: AttendanceGuard::new(
            shared_db.clone(),
            Arc::new(blobs.clone()),
            Arc::new(queue.clone()),
        ),
        enricher: AddressEnricher::new(shared_db, geocoder, Duration::from_secs(1)),
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        blobs,
        queue,
    }
}

#[derive(Serialize)]
struct Claims {
    sub: String,
    exp: usize,
    iat: usize,
}

/// Create a session JWT the auth middleware accepts.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: u64, config: &Config) -> String {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + 3600,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&config.jwt_signing_key),
    )
    .expect("Failed to create JWT")
}

/// Store a session whose window opened at `open_at`.
#[allow(dead_code)]
pub async fn seed_session(
    db: &MemoryDb,
    id: u64,
    label: &str,
    open_at: Option<DateTime<Utc>>,
) -> AttendanceSession {
    let mut session = AttendanceSession::new(
        id,
        label,
        NaiveDate::from_ymd_opt(2026, 9, 1).unwrap() + chrono::Duration::days(id as i64),
    );
    session.attendance_open_at = open_at;
    db.upsert_session(&session).await.unwrap();
    session
}

/// Smallest byte string that passes JPEG detection.
#[allow(dead_code)]
pub fn jpeg_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.resize(len.max(4), 0x42);
    bytes
}

const BOUNDARY: &str = "class-companion-test-boundary";

/// Build a multipart/form-data body. Returns (content type, body).
#[allow(dead_code)]
pub fn multipart_body(fields: &[(&str, String)], selfie: Option<&[u8]>) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some(selfie) = selfie {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"selfie\"; filename=\"selfie.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
                BOUNDARY
            )
            .as_bytes(),
        );
        body.extend_from_slice(selfie);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

/// Standard submission fields at the given position.
#[allow(dead_code)]
pub fn position_fields(lat: f64, lon: f64) -> Vec<(&'static str, String)> {
    vec![
        ("latitude", lat.to_string()),
        ("longitude", lon.to_string()),
        ("face_detected", "true".to_string()),
    ]
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
