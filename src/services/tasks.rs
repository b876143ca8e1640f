// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background task dispatch for address enrichment.
//!
//! Production uses Google Cloud Tasks (google-cloud-tasks-v2 SDK), which
//! delivers at least once and retries natively. Local development can run
//! the enricher in-process instead.

use crate::error::AppError;
use crate::error::Result;
use crate::services::enricher::{AddressEnricher, EnrichOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, OnceCell};
use tokio::task::JoinHandle;

/// Task endpoint path, relative to the service URL.
pub const ENRICH_ADDRESS_PATH: &str = "/tasks/enrich-address";

const LOCAL_MAX_ATTEMPTS: u32 = 3;
const LOCAL_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Payload sent to the address enrichment task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichAddressPayload {
    pub attendance_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Hand the task to the runner. Returning `Ok` means it will be attempted.
    async fn enqueue_address_enrichment(&self, payload: EnrichAddressPayload) -> Result<()>;
}

/// Cloud Tasks client wrapper.
pub struct TasksService {
    project_id: String,
    location: String,
    queue_name: String,
    service_url: String,
    client: OnceCell<google_cloud_tasks_v2::client::CloudTasks>,
}

impl TasksService {
    pub fn new(project_id: &str, region: &str, service_url: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            location: region.to_string(),
            queue_name: crate::config::ENRICHMENT_QUEUE_NAME.to_string(),
            service_url: service_url.trim_end_matches('/').to_string(),
            client: OnceCell::new(),
        }
    }

    fn queue_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, self.queue_name
        )
    }

    /// Generic task queuing helper.
    async fn queue_task<T: Serialize>(&self, endpoint: &str, payload: &T) -> Result<()> {
        use google_cloud_tasks_v2::client::CloudTasks;
        use google_cloud_tasks_v2::model::{HttpRequest, OidcToken, Task};

        let client = self
            .client
            .get_or_try_init(|| async { CloudTasks::builder().build().await })
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks client error: {}", e)))?;

        let body = serde_json::to_vec(payload)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JSON error: {}", e)))?;

        let http_request = HttpRequest::default()
            .set_url(format!("{}{}", self.service_url, endpoint))
            .set_http_method("POST")
            .set_body(axum::body::Bytes::from(body))
            .set_headers(std::collections::HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]))
            .set_oidc_token(
                OidcToken::default()
                    .set_service_account_email(format!(
                        "class-companion-api@{}.iam.gserviceaccount.com",
                        self.project_id
                    ))
                    .set_audience(self.service_url.clone()),
            );

        let task = Task::default().set_http_request(http_request);

        let _response = client
            .create_task()
            .set_parent(self.queue_path())
            .set_task(task)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks create error: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl TaskQueue for TasksService {
    async fn enqueue_address_enrichment(&self, payload: EnrichAddressPayload) -> Result<()> {
        self.queue_task(ENRICH_ADDRESS_PATH, &payload).await?;
        tracing::debug!(
            attendance_id = %payload.attendance_id,
            "Queued address enrichment task"
        );
        Ok(())
    }
}

/// In-process task runner for local development.
///
/// Not durable: tasks still in the channel are lost if the process exits.
#[derive(Clone)]
pub struct LocalTaskQueue {
    sender: mpsc::UnboundedSender<EnrichAddressPayload>,
}

impl LocalTaskQueue {
    /// Start the worker. It runs until every queue handle is dropped.
    pub fn spawn(enricher: AddressEnricher) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<EnrichAddressPayload>();

        let handle = tokio::spawn(async move {
            while let Some(payload) = receiver.recv().await {
                run_local_task(&enricher, &payload).await;
            }
            tracing::debug!("Local task queue closed");
        });

        (Self { sender }, handle)
    }
}

/// Retry record-store failures a few times, like the Cloud Tasks retry policy.
async fn run_local_task(enricher: &AddressEnricher, payload: &EnrichAddressPayload) {
    for attempt in 1..=LOCAL_MAX_ATTEMPTS {
        match enricher
            .enrich(&payload.attendance_id, payload.latitude, payload.longitude)
            .await
        {
            Ok(outcome) => {
                tracing::debug!(
                    attendance_id = %payload.attendance_id,
                    resolved = matches!(outcome, EnrichOutcome::Updated(_)),
                    "Local enrichment task finished"
                );
                return;
            }
            Err(e) => {
                tracing::warn!(
                    attendance_id = %payload.attendance_id,
                    attempt,
                    error = %e,
                    "Local enrichment task failed"
                );
                if attempt < LOCAL_MAX_ATTEMPTS {
                    tokio::time::sleep(LOCAL_RETRY_DELAY).await;
                }
            }
        }
    }
    tracing::error!(
        attendance_id = %payload.attendance_id,
        "Giving up on local enrichment task"
    );
}

#[async_trait]
impl TaskQueue for LocalTaskQueue {
    async fn enqueue_address_enrichment(&self, payload: EnrichAddressPayload) -> Result<()> {
        self.sender.send(payload).map_err(|_| {
            AppError::Internal(anyhow::anyhow!("Local task worker is not running"))
        })
    }
}

/// Queue that only records what was enqueued. Used by tests.
#[derive(Clone, Default)]
pub struct RecordingQueue {
    payloads: Arc<Mutex<Vec<EnrichAddressPayload>>>,
    failures_left: Arc<AtomicUsize>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent enqueue fail, or stop failing.
    pub fn set_failing(&self, fail: bool) {
        let failures = if fail { usize::MAX } else { 0 };
        self.failures_left.store(failures, Ordering::SeqCst);
    }

    /// Fail the next `count` enqueues, then accept again.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub async fn payloads(&self) -> Vec<EnrichAddressPayload> {
        self.payloads.lock().await.clone()
    }
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn enqueue_address_enrichment(&self, payload: EnrichAddressPayload) -> Result<()> {
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Task queue unavailable (simulated)"
            )));
        }
        self.payloads.lock().await.push(payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, MemoryDb};
    use crate::models::{Attendance, PLACEHOLDER_ADDRESS};
    use crate::services::geocoding::{GeocodeError, Geocoder};

    struct StaticGeocoder;

    #[async_trait]
    impl Geocoder for StaticGeocoder {
        async fn reverse_geocode(
            &self,
            _lat: f64,
            _lon: f64,
        ) -> std::result::Result<String, GeocodeError> {
            Ok("Universitas Indonesia, Depok".to_string())
        }
    }

    fn payload(id: &str) -> EnrichAddressPayload {
        EnrichAddressPayload {
            attendance_id: id.to_string(),
            latitude: -6.2,
            longitude: 106.816666,
        }
    }

    #[test]
    fn payload_wire_format() {
        let json = serde_json::to_value(payload("3_7")).unwrap();
        assert_eq!(json["attendance_id"], "3_7");
        assert_eq!(json["latitude"], -6.2);
        assert_eq!(json["longitude"], 106.816666);
    }

    #[test]
    fn queue_path_uses_enrichment_queue() {
        let service = TasksService::new("test-project", "asia-southeast2", "https://api.test/");
        assert_eq!(
            service.queue_path(),
            "projects/test-project/locations/asia-southeast2/queues/attendance-address"
        );
        assert_eq!(service.service_url, "https://api.test");
    }

    #[tokio::test]
    async fn recording_queue_records_and_fails_on_demand() {
        let queue = RecordingQueue::new();
        queue.enqueue_address_enrichment(payload("1_1")).await.unwrap();

        queue.set_failing(true);
        assert!(queue
            .enqueue_address_enrichment(payload("2_1"))
            .await
            .is_err());

        assert_eq!(queue.payloads().await, vec![payload("1_1")]);

        queue.fail_next(1);
        assert!(queue
            .enqueue_address_enrichment(payload("3_1"))
            .await
            .is_err());
        queue.enqueue_address_enrichment(payload("4_1")).await.unwrap();
        assert_eq!(
            queue.payloads().await,
            vec![payload("1_1"), payload("4_1")]
        );
    }

    #[tokio::test]
    async fn local_queue_runs_enrichment() {
        let db = MemoryDb::new();
        db.insert_attendance(&Attendance {
            id: "3_7".to_string(),
            user_id: 7,
            session_id: 3,
            selfie_path: "selfies/a.jpg".to_string(),
            latitude: -6.2,
            longitude: 106.816666,
            address: PLACEHOLDER_ADDRESS.to_string(),
            face_detected: false,
            submitted_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

        let enricher = AddressEnricher::new(
            Arc::new(db.clone()),
            Arc::new(StaticGeocoder),
            Duration::from_secs(1),
        );
        let (queue, worker) = LocalTaskQueue::spawn(enricher);

        queue.enqueue_address_enrichment(payload("3_7")).await.unwrap();
        drop(queue);
        worker.await.unwrap();

        let stored = db.get_attendance("3_7").await.unwrap().unwrap();
        assert_eq!(stored.address, "Universitas Indonesia, Depok");
    }
}
