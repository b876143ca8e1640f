//! Database layer.
//!
//! `Database` is the record store seam. `FirestoreDb` backs production;
//! `MemoryDb` backs local development and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Attendance, AttendanceSession, Material};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    pub const ATTENDANCE_SESSIONS: &str = "attendance_sessions";
    pub const ATTENDANCES: &str = "attendances";
    pub const MATERIALS: &str = "materials";
    pub const SETTINGS: &str = "settings";
}

/// Result of a conditional attendance insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// A record for the same (user, session) pair already exists.
    AlreadyExists,
}

#[async_trait]
pub trait Database: Send + Sync {
    // --- Sessions ---
    async fn get_session(&self, session_id: u64) -> Result<Option<AttendanceSession>, AppError>;

    /// All sessions, most recent session date first.
    async fn list_sessions(&self) -> Result<Vec<AttendanceSession>, AppError>;

    async fn upsert_session(&self, session: &AttendanceSession) -> Result<(), AppError>;

    /// Set `attendance_open_at` to `now` unless it is already set.
    ///
    /// Returns the session as stored afterwards, or `None` if it does not exist.
    async fn open_session_window(
        &self,
        session_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<AttendanceSession>, AppError>;

    // --- Attendances ---
    async fn find_attendance(
        &self,
        user_id: u64,
        session_id: u64,
    ) -> Result<Option<Attendance>, AppError>;

    async fn get_attendance(&self, attendance_id: &str) -> Result<Option<Attendance>, AppError>;

    /// Create the record only if none exists for its (user, session) pair.
    ///
    /// Must be atomic across service instances.
    async fn insert_attendance(&self, attendance: &Attendance) -> Result<InsertOutcome, AppError>;

    /// Overwrite the address of an existing record.
    ///
    /// Returns `false` without writing if the record no longer exists.
    async fn update_attendance_address(
        &self,
        attendance_id: &str,
        address: &str,
    ) -> Result<bool, AppError>;

    /// A user's attendances, newest submission first.
    async fn list_attendances_for_user(&self, user_id: u64) -> Result<Vec<Attendance>, AppError>;

    /// Attendances with `from <= submitted_at < to`, in no particular order.
    async fn list_attendances_submitted_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Attendance>, AppError>;

    // --- Materials ---
    async fn get_material(&self, material_id: u64) -> Result<Option<Material>, AppError>;

    /// Published materials, newest first.
    async fn list_published_materials(&self) -> Result<Vec<Material>, AppError>;

    async fn upsert_material(&self, material: &Material) -> Result<(), AppError>;

    // --- Settings ---
    async fn get_setting(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), AppError>;
}
