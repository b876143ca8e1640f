// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Attendance sessions (check-in windows)
//! - Attendances (one document per user and session)
//! - Materials (published course resources)
//! - Settings (string key/value pairs)

use crate::db::{collections, Database, InsertOutcome};
use crate::error::AppError;
use crate::models::{Attendance, AttendanceSession, Material, Setting};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::errors::{BackoffError, FirestoreError};
use firestore::{FirestoreTimestamp, FirestoreWritePrecondition};
use serde::{Deserialize, Serialize};

/// Partial attendance document for the masked address write.
#[derive(Serialize, Deserialize)]
struct AddressPatch {
    address: String,
}

/// A write precondition on a missing document fails with NOT_FOUND, or
/// FAILED_PRECONDITION on some backends.
fn is_missing_document(err: &FirestoreError) -> bool {
    match err {
        FirestoreError::DataNotFoundError(_) => true,
        FirestoreError::DatabaseError(e) => e.public.code == "FailedPrecondition",
        _ => false,
    }
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }
}

#[async_trait]
impl Database for FirestoreDb {
    // ─── Session Operations ──────────────────────────────────────

    async fn get_session(&self, session_id: u64) -> Result<Option<AttendanceSession>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ATTENDANCE_SESSIONS)
            .obj()
            .one(&session_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_sessions(&self) -> Result<Vec<AttendanceSession>, AppError> {
        // session_date is stored as YYYY-MM-DD, so string order is date order
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ATTENDANCE_SESSIONS)
            .order_by([(
                "session_date",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_session(&self, session: &AttendanceSession) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ATTENDANCE_SESSIONS)
            .document_id(session.id.to_string())
            .object(session)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Read and write run in one Firestore transaction, so concurrent opens
    /// conflict and the loser retries against the committed timestamp.
    async fn open_session_window(
        &self,
        session_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<AttendanceSession>, AppError> {
        let (session, opened) = self
            .get_client()?
            .run_transaction(move |db, transaction| {
                Box::pin(async move {
                    let session: Option<AttendanceSession> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::ATTENDANCE_SESSIONS)
                        .obj()
                        .one(&session_id.to_string())
                        .await?;

                    let Some(mut session) = session else {
                        return Ok::<_, BackoffError<FirestoreError>>((None, false));
                    };
                    if !session.open_window(now) {
                        return Ok((Some(session), false));
                    }

                    db.fluent()
                        .update()
                        .fields(firestore::paths!(AttendanceSession::{attendance_open_at}))
                        .in_col(collections::ATTENDANCE_SESSIONS)
                        .document_id(session_id.to_string())
                        .object(&session)
                        .add_to_transaction(transaction)?;

                    Ok((Some(session), true))
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Open window transaction failed: {}", e)))?;

        if opened {
            tracing::info!(session_id, open_at = %now, "Attendance window opened");
        } else if session.is_some() {
            tracing::debug!(session_id, "Attendance window already opened");
        }

        Ok(session)
    }

    // ─── Attendance Operations ───────────────────────────────────

    async fn find_attendance(
        &self,
        user_id: u64,
        session_id: u64,
    ) -> Result<Option<Attendance>, AppError> {
        self.get_attendance(&Attendance::document_id(user_id, session_id))
            .await
    }

    async fn get_attendance(&self, attendance_id: &str) -> Result<Option<Attendance>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ATTENDANCES)
            .obj()
            .one(attendance_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create-only write; Firestore rejects it with ALREADY_EXISTS when a
    /// document with the same (session, user) ID is present.
    async fn insert_attendance(&self, attendance: &Attendance) -> Result<InsertOutcome, AppError> {
        let result: Result<Attendance, _> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::ATTENDANCES)
            .document_id(&attendance.id)
            .object(attendance)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(FirestoreError::DataConflictError(_)) => {
                tracing::debug!(
                    attendance_id = %attendance.id,
                    "Attendance document already exists"
                );
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    /// Patch only `address`, and only if the document still exists. Without
    /// the precondition Firestore would upsert a document holding nothing
    /// but the address.
    async fn update_attendance_address(
        &self,
        attendance_id: &str,
        address: &str,
    ) -> Result<bool, AppError> {
        let patch = AddressPatch {
            address: address.to_string(),
        };

        let result: Result<(), FirestoreError> = self
            .get_client()?
            .fluent()
            .update()
            .fields(firestore::paths!(AddressPatch::{address}))
            .in_col(collections::ATTENDANCES)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(attendance_id)
            .object(&patch)
            .execute()
            .await;

        match result {
            Ok(()) => Ok(true),
            Err(e) if is_missing_document(&e) => {
                tracing::debug!(attendance_id, "Attendance gone before address update");
                Ok(false)
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn list_attendances_for_user(&self, user_id: u64) -> Result<Vec<Attendance>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ATTENDANCES)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id)]))
            .order_by([(
                "submitted_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Range on `submitted_at` alone, which the automatic single-field
    /// index serves without a composite index.
    async fn list_attendances_submitted_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Attendance>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ATTENDANCES)
            .filter(move |q| {
                q.for_all([
                    q.field("submitted_at")
                        .greater_than_or_equal(FirestoreTimestamp(from)),
                    q.field("submitted_at").less_than(FirestoreTimestamp(to)),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Material Operations ─────────────────────────────────────

    async fn get_material(&self, material_id: u64) -> Result<Option<Material>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::MATERIALS)
            .obj()
            .one(&material_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Sorted here rather than with `order_by`, which would need a
    /// composite index next to the `is_published` filter.
    async fn list_published_materials(&self) -> Result<Vec<Material>, AppError> {
        let mut materials: Vec<Material> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::MATERIALS)
            .filter(|q| q.for_all([q.field("is_published").eq(true)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        materials.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(materials)
    }

    async fn upsert_material(&self, material: &Material) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::MATERIALS)
            .document_id(material.id.to_string())
            .object(material)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Settings Operations ─────────────────────────────────────

    async fn get_setting(&self, key: &str) -> Result<Option<String>, AppError> {
        let setting: Option<Setting> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SETTINGS)
            .obj()
            .one(key)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(setting.map(|s| s.value))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), AppError> {
        let setting = Setting {
            key: key.to_string(),
            value: value.to_string(),
        };

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SETTINGS)
            .document_id(key)
            .object(&setting)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_mode_reports_database_error() {
        let db = FirestoreDb::new_mock();

        let err = db.get_session(1).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));

        let err = db.get_setting("geofencing_enabled").await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }
}
