// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory record store for local development and tests.
//!
//! Each collection is a `DashMap`, so the conditional attendance insert is
//! atomic through the entry API. It is only atomic within one process;
//! multi-instance deployments use Firestore.

use crate::db::{Database, InsertOutcome};
use crate::error::AppError;
use crate::models::{Attendance, AttendanceSession, Material};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Collections {
    sessions: DashMap<u64, AttendanceSession>,
    attendances: DashMap<String, Attendance>,
    materials: DashMap<u64, Material>,
    settings: DashMap<String, String>,
    unavailable: AtomicBool,
}

/// DashMap-backed database. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Collections>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with a database error, simulating an outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Remove an attendance record (administrative deletion).
    pub fn delete_attendance(&self, attendance_id: &str) -> Option<Attendance> {
        self.inner
            .attendances
            .remove(attendance_id)
            .map(|(_, attendance)| attendance)
    }

    /// Number of stored attendance records.
    pub fn attendance_count(&self) -> usize {
        self.inner.attendances.len()
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Database(
                "Database unavailable (simulated outage)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Database for MemoryDb {
    async fn get_session(&self, session_id: u64) -> Result<Option<AttendanceSession>, AppError> {
        self.check_available()?;
        Ok(self
            .inner
            .sessions
            .get(&session_id)
            .map(|s| s.value().clone()))
    }

    async fn list_sessions(&self) -> Result<Vec<AttendanceSession>, AppError> {
        self.check_available()?;
        let mut sessions: Vec<AttendanceSession> = self
            .inner
            .sessions
            .iter()
            .map(|s| s.value().clone())
            .collect();
        sessions.sort_by(|a, b| {
            b.session_date
                .cmp(&a.session_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(sessions)
    }

    async fn upsert_session(&self, session: &AttendanceSession) -> Result<(), AppError> {
        self.check_available()?;
        self.inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn open_session_window(
        &self,
        session_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<AttendanceSession>, AppError> {
        self.check_available()?;
        Ok(self.inner.sessions.get_mut(&session_id).map(|mut session| {
            session.open_window(now);
            session.value().clone()
        }))
    }

    async fn find_attendance(
        &self,
        user_id: u64,
        session_id: u64,
    ) -> Result<Option<Attendance>, AppError> {
        self.get_attendance(&Attendance::document_id(user_id, session_id))
            .await
    }

    async fn get_attendance(&self, attendance_id: &str) -> Result<Option<Attendance>, AppError> {
        self.check_available()?;
        Ok(self
            .inner
            .attendances
            .get(attendance_id)
            .map(|a| a.value().clone()))
    }

    async fn insert_attendance(&self, attendance: &Attendance) -> Result<InsertOutcome, AppError> {
        self.check_available()?;
        match self.inner.attendances.entry(attendance.id.clone()) {
            Entry::Occupied(_) => Ok(InsertOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(attendance.clone());
                Ok(InsertOutcome::Created)
            }
        }
    }

    async fn update_attendance_address(
        &self,
        attendance_id: &str,
        address: &str,
    ) -> Result<bool, AppError> {
        self.check_available()?;
        match self.inner.attendances.get_mut(attendance_id) {
            Some(mut attendance) => {
                attendance.address = address.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_attendances_for_user(&self, user_id: u64) -> Result<Vec<Attendance>, AppError> {
        self.check_available()?;
        let mut attendances: Vec<Attendance> = self
            .inner
            .attendances
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.value().clone())
            .collect();
        attendances.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(attendances)
    }

    async fn list_attendances_submitted_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Attendance>, AppError> {
        self.check_available()?;
        Ok(self
            .inner
            .attendances
            .iter()
            .filter(|a| a.submitted_at >= from && a.submitted_at < to)
            .map(|a| a.value().clone())
            .collect())
    }

    async fn get_material(&self, material_id: u64) -> Result<Option<Material>, AppError> {
        self.check_available()?;
        Ok(self
            .inner
            .materials
            .get(&material_id)
            .map(|m| m.value().clone()))
    }

    async fn list_published_materials(&self) -> Result<Vec<Material>, AppError> {
        self.check_available()?;
        let mut materials: Vec<Material> = self
            .inner
            .materials
            .iter()
            .filter(|m| m.is_published)
            .map(|m| m.value().clone())
            .collect();
        materials.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(materials)
    }

    async fn upsert_material(&self, material: &Material) -> Result<(), AppError> {
        self.check_available()?;
        self.inner.materials.insert(material.id, material.clone());
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, AppError> {
        self.check_available()?;
        Ok(self.inner.settings.get(key).map(|v| v.value().clone()))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.check_available()?;
        self.inner
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
