// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Class Companion: attendance check-in backend
//!
//! Students submit a selfie and GPS position while a session's check-in
//! window is open. Submissions are validated (duplicate, window, payload,
//! geofence), stored with a placeholder address, and enriched with a
//! reverse-geocoded address in the background.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use services::{AddressEnricher, AttendanceGuard, SettingsService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn Database>,
    pub settings: SettingsService,
    pub guard: AttendanceGuard,
    pub enricher: AddressEnricher,
}
