// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Attendance record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Address stored until the background lookup overwrites it.
pub const PLACEHOLDER_ADDRESS: &str = "Awaiting location verification...";

/// Stored attendance record in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attendance {
    /// Document ID, derived from (session_id, user_id)
    pub id: String,
    pub user_id: u64,
    pub session_id: u64,
    /// Opaque blob store reference for the selfie
    pub selfie_path: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Placeholder until enrichment succeeds
    pub address: String,
    pub face_detected: bool,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub submitted_at: DateTime<Utc>,
}

impl Attendance {
    /// Document ID for a (user, session) pair.
    ///
    /// Deterministic so that creating the document doubles as the
    /// one-attendance-per-user-per-session check.
    pub fn document_id(user_id: u64, session_id: u64) -> String {
        format!("{}_{}", session_id, user_id)
    }

    /// Whether the background lookup has replaced the placeholder.
    pub fn has_resolved_address(&self) -> bool {
        self.address != PLACEHOLDER_ADDRESS
    }
}
