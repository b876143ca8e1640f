// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gate for the address enrichment task endpoint.
//!
//! Cloud Run strips `X-CloudTasks-*` headers from external requests, so a
//! request carrying the enrichment queue's name was delivered by Cloud Tasks.
//! The local task runner calls the enricher directly and never comes here.

use crate::config::ENRICHMENT_QUEUE_NAME;
use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

const QUEUE_NAME_HEADER: &str = "x-cloudtasks-queuename";

/// Whether the request names the enrichment queue as its sender.
fn from_enrichment_queue(headers: &HeaderMap) -> bool {
    headers
        .get(QUEUE_NAME_HEADER)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|name| name == ENRICHMENT_QUEUE_NAME)
}

/// Reject `/tasks/*` requests that did not come from the enrichment queue.
pub async fn require_tasks_queue(request: Request, next: Next) -> Result<Response, StatusCode> {
    if !from_enrichment_queue(request.headers()) {
        tracing::warn!(
            path = %request.uri().path(),
            queue = ?request.headers().get(QUEUE_NAME_HEADER),
            "Blocked enrichment task from outside the queue"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(queue: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(QUEUE_NAME_HEADER, queue.parse().unwrap());
        headers
    }

    #[test]
    fn only_enrichment_queue_passes() {
        assert!(from_enrichment_queue(&headers(ENRICHMENT_QUEUE_NAME)));
        assert!(!from_enrichment_queue(&headers("activity-sync")));
        assert!(!from_enrichment_queue(&headers("")));
        assert!(!from_enrichment_queue(&HeaderMap::new()));
    }
}
