// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Business settings that administrators change at runtime (geofencing,
//! campus coordinates) are not here; they live in the settings collection
//! and are read per request through `SettingsService`.

use std::env;
use std::time::Duration;

/// Cloud Tasks queue that carries address enrichment tasks.
pub const ENRICHMENT_QUEUE_NAME: &str = "attendance-address";

const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_SELFIE_STORAGE_DIR: &str = "storage";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 900;
const DEFAULT_GEOCODER_USER_AGENT: &str = "class-companion/0.1 (attendance address lookup)";

/// Where address enrichment tasks are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TasksBackend {
    /// Google Cloud Tasks (durable, at-least-once).
    Cloud,
    /// In-process worker for local development.
    Local,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Public base URL of this service (Cloud Tasks callback target)
    pub api_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region hosting the task queue
    pub gcp_region: String,
    /// Server port
    pub port: u16,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Reverse geocoding base URL (Nominatim-compatible)
    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    /// Upper bound on a single reverse geocoding call
    pub geocoder_timeout: Duration,
    /// Root directory for stored selfies
    pub selfie_storage_dir: String,
    pub tasks_backend: TasksBackend,
    /// How often unresolved addresses are re-enqueued
    pub enrichment_sweep_interval: Duration,
}

impl Config {
    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            api_url: "http://localhost:8080".to_string(),
            gcp_project_id: "test-project".to_string(),
            gcp_region: "asia-southeast2".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            geocoder_url: "http://127.0.0.1:9".to_string(),
            geocoder_user_agent: DEFAULT_GEOCODER_USER_AGENT.to_string(),
            geocoder_timeout: Duration::from_secs(2),
            // Tests store selfies in memory; nothing is written here
            selfie_storage_dir: DEFAULT_SELFIE_STORAGE_DIR.to_string(),
            tasks_backend: TasksBackend::Local,
            enrichment_sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let port: u16 = match env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", raw))?,
            Err(_) => 8080,
        };

        let geocoder_timeout_secs: u64 = match env::var("GEOCODER_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("GEOCODER_TIMEOUT_SECS", raw))?,
            Err(_) => 10,
        };

        let sweep_interval_secs: u64 = match env::var("ENRICHMENT_SWEEP_INTERVAL_SECS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid("ENRICHMENT_SWEEP_INTERVAL_SECS", raw))?,
            Err(_) => DEFAULT_SWEEP_INTERVAL_SECS,
        };

        let tasks_backend = match env::var("TASKS_BACKEND") {
            Ok(raw) => parse_tasks_backend(&raw)
                .ok_or(ConfigError::Invalid("TASKS_BACKEND", raw))?,
            Err(_) => TasksBackend::Cloud,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            api_url: env::var("API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://localhost:{}", port)),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "asia-southeast2".to_string()),
            port,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            geocoder_url: env::var("GEOCODER_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_GEOCODER_URL.to_string()),
            geocoder_user_agent: env::var("GEOCODER_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_GEOCODER_USER_AGENT.to_string()),
            geocoder_timeout: Duration::from_secs(geocoder_timeout_secs),
            selfie_storage_dir: env::var("SELFIE_STORAGE_DIR")
                .unwrap_or_else(|_| DEFAULT_SELFIE_STORAGE_DIR.to_string()),
            tasks_backend,
            enrichment_sweep_interval: Duration::from_secs(sweep_interval_secs),
        })
    }
}

fn parse_tasks_backend(raw: &str) -> Option<TasksBackend> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "cloud" => Some(TasksBackend::Cloud),
        "local" => Some(TasksBackend::Local),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
