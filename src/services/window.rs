// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Check-in window arithmetic for attendance sessions.
//!
//! A session is open from `attendance_open_at` through
//! `attendance_open_at + 15 minutes`, both ends inclusive.

use crate::models::AttendanceSession;
use chrono::{DateTime, Duration, Utc};

/// Length of the check-in window.
pub const WINDOW_MINUTES: i64 = 15;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Where a session's window stands at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// `attendance_open_at` has never been set.
    NotOpened,
    /// `attendance_open_at` is later than now.
    Pending,
    Open { remaining_minutes: i64 },
    Expired,
}

/// Classify the window for `open_at` as seen at `now`.
pub fn window_state(open_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> WindowState {
    let Some(open_at) = open_at else {
        return WindowState::NotOpened;
    };

    let elapsed = now - open_at;
    if elapsed < Duration::zero() {
        WindowState::Pending
    } else if elapsed <= Duration::minutes(WINDOW_MINUTES) {
        WindowState::Open {
            remaining_minutes: remaining(elapsed),
        }
    } else {
        WindowState::Expired
    }
}

/// Whether submissions are accepted for `session` at `now`.
pub fn is_open(session: &AttendanceSession, now: DateTime<Utc>) -> bool {
    matches!(
        window_state(session.attendance_open_at, now),
        WindowState::Open { .. }
    )
}

/// Minutes left in the window, `None` if it was never opened.
///
/// `max(0, 15 - elapsed)`; partial minutes round up so an open window never
/// reports zero before its last instant. Before the open time this exceeds 15.
pub fn remaining_minutes(session: &AttendanceSession, now: DateTime<Utc>) -> Option<i64> {
    session
        .attendance_open_at
        .map(|open_at| remaining(now - open_at))
}

fn remaining(elapsed: Duration) -> i64 {
    let left_ms = WINDOW_MINUTES * MILLIS_PER_MINUTE - elapsed.num_milliseconds();
    if left_ms <= 0 {
        return 0;
    }
    (left_ms + MILLIS_PER_MINUTE - 1) / MILLIS_PER_MINUTE
}
