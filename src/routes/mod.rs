// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP routing: the student API, the enrichment task endpoint, and health.

pub mod api;
pub mod tasks;

use crate::middleware::auth::require_auth;
use crate::middleware::tasks_auth::require_tasks_queue;
use crate::AppState;
use axum::http::{header, HeaderValue, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

/// Dev origins accepted alongside the configured frontend.
const LOCAL_ORIGIN_PREFIXES: [&str; 2] = ["http://localhost", "http://127.0.0.1"];

/// The student frontend, or a local dev server on any port.
fn is_allowed_origin(origin: &str, frontend_url: &str) -> bool {
    origin == frontend_url
        || LOCAL_ORIGIN_PREFIXES
            .iter()
            .any(|prefix| origin.starts_with(prefix))
}

/// Students only read and submit; there are no PUT or DELETE routes.
fn cors_layer(frontend_url: String) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .is_ok_and(|origin| is_allowed_origin(origin, &frontend_url))
        }))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

/// Build the complete router: health, enrichment tasks, student API.
pub fn create_router(state: Arc<AppState>) -> Router {
    // Only reachable with the queue header that Cloud Tasks sets
    let task_routes = tasks::routes().route_layer(middleware::from_fn(require_tasks_queue));

    // Bearer token required; the handlers read the caller from AuthUser
    let student_routes =
        api::routes().route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_check))
        .merge(task_routes)
        .merge(student_routes)
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors_layer(state.config.frontend_url.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins() {
        let frontend = "https://companion.example.edu";
        assert!(is_allowed_origin(frontend, frontend));
        assert!(is_allowed_origin("http://localhost:3000", frontend));
        assert!(is_allowed_origin("http://127.0.0.1:5173", frontend));

        assert!(!is_allowed_origin("https://companion.example.edu.evil.test", frontend));
        assert!(!is_allowed_origin("https://localhost:3000", frontend));
        assert!(!is_allowed_origin("", frontend));
    }
}
