// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod attendance;
pub mod material;
pub mod session;
pub mod settings;

pub use attendance::{Attendance, PLACEHOLDER_ADDRESS};
pub use material::Material;
pub use session::AttendanceSession;
pub use settings::{AttendanceSettings, Setting};
