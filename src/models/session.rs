// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Attendance session model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A recurring class meeting that students check in to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendanceSession {
    /// Session ID (also used as document ID)
    pub id: u64,
    /// Free-text label, e.g. "Week 3", "Midterm"
    pub week_label: String,
    /// Calendar date of the meeting
    pub session_date: NaiveDate,
    /// Optional linked course material
    #[serde(default)]
    pub material_id: Option<u64>,
    /// When an administrator opened the check-in window (unset = never opened)
    #[serde(default, with = "firestore::serialize_as_optional_timestamp")]
    pub attendance_open_at: Option<DateTime<Utc>>,
}

impl AttendanceSession {
    pub fn new(id: u64, week_label: impl Into<String>, session_date: NaiveDate) -> Self {
        Self {
            id,
            week_label: week_label.into(),
            session_date,
            material_id: None,
            attendance_open_at: None,
        }
    }

    /// Open the check-in window at `now`.
    ///
    /// The window can only be opened once; returns `false` and leaves the
    /// existing timestamp alone if it was already set.
    pub fn open_window(&mut self, now: DateTime<Utc>) -> bool {
        if self.attendance_open_at.is_some() {
            return false;
        }
        self.attendance_open_at = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn open_window_only_once() {
        let mut session = AttendanceSession::new(
            1,
            "Week 1",
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
        );
        let first = Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 9, 1, 9, 0, 0).unwrap();

        assert!(session.open_window(first));
        assert!(!session.open_window(second));
        assert_eq!(session.attendance_open_at, Some(first));
    }
}
