// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Class Companion API Server
//!
//! Records student attendance for class sessions and resolves the
//! check-in location to an address in the background.

use class_companion::{
    config::{Config, TasksBackend},
    db::{Database, FirestoreDb},
    services::{
        AddressEnricher, AttendanceGuard, LocalBlobStore, LocalTaskQueue, NominatimGeocoder,
        SettingsService, TaskQueue, TasksService, UnresolvedSweep,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Class Companion API");

    // Initialize Firestore database
    let db: Arc<dyn Database> = Arc::new(FirestoreDb::new(&config.gcp_project_id).await?);

    let geocoder = Arc::new(NominatimGeocoder::new(
        &config.geocoder_url,
        &config.geocoder_user_agent,
        config.geocoder_timeout,
    )?);
    let enricher = AddressEnricher::new(db.clone(), geocoder, config.geocoder_timeout);

    let queue: Arc<dyn TaskQueue> = match config.tasks_backend {
        TasksBackend::Cloud => {
            tracing::info!(
                project = %config.gcp_project_id,
                region = %config.gcp_region,
                "Cloud Tasks service initialized"
            );
            Arc::new(TasksService::new(
                &config.gcp_project_id,
                &config.gcp_region,
                &config.api_url,
            ))
        }
        TasksBackend::Local => {
            tracing::info!("Using in-process task queue");
            let (queue, _worker) = LocalTaskQueue::spawn(enricher.clone());
            Arc::new(queue)
        }
    };

    UnresolvedSweep::new(db.clone(), queue.clone()).spawn(config.enrichment_sweep_interval);
    tracing::info!(
        every_secs = config.enrichment_sweep_interval.as_secs(),
        "Unresolved address sweep started"
    );

    let blobs = Arc::new(LocalBlobStore::new(&config.selfie_storage_dir));
    tracing::info!(root = %config.selfie_storage_dir, "Selfie storage initialized");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db: db.clone(),
        settings: SettingsService::new(db.clone()),
        guard: AttendanceGuard::new(db, blobs, queue),
        enricher,
    });

    // Build router
    let app = class_companion::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("class_companion=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
