// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Periodic re-enqueue of attendances whose address never resolved.
//!
//! Covers records whose enrichment task was never accepted by the queue,
//! and tasks the runner gave up on. Only records submitted inside a bounded
//! age window are picked up, so a coordinate the geocoder cannot resolve is
//! retried a few times and then left with the placeholder.

use crate::db::Database;
use crate::error::AppError;
use crate::services::tasks::{EnrichAddressPayload, TaskQueue};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Younger records may still have their first task in flight.
const MIN_AGE_MINUTES: i64 = 10;
/// Older records are left alone.
const MAX_AGE_MINUTES: i64 = 120;

#[derive(Clone)]
pub struct UnresolvedSweep {
    db: Arc<dyn Database>,
    queue: Arc<dyn TaskQueue>,
}

impl UnresolvedSweep {
    pub fn new(db: Arc<dyn Database>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { db, queue }
    }

    /// Re-enqueue every placeholder record in the age window.
    ///
    /// Returns how many tasks were enqueued. An enqueue failure is logged
    /// and left for the next pass.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let from = now - ChronoDuration::minutes(MAX_AGE_MINUTES);
        let to = now - ChronoDuration::minutes(MIN_AGE_MINUTES);

        let pending: Vec<_> = self
            .db
            .list_attendances_submitted_between(from, to)
            .await?
            .into_iter()
            .filter(|a| !a.has_resolved_address())
            .collect();

        let mut enqueued = 0;
        for attendance in pending {
            let task = EnrichAddressPayload {
                attendance_id: attendance.id.clone(),
                latitude: attendance.latitude,
                longitude: attendance.longitude,
            };
            match self.queue.enqueue_address_enrichment(task).await {
                Ok(()) => enqueued += 1,
                Err(e) => tracing::warn!(
                    attendance_id = %attendance.id,
                    error = %e,
                    "Sweep could not re-enqueue address enrichment"
                ),
            }
        }

        if enqueued > 0 {
            tracing::info!(enqueued, "Re-enqueued unresolved addresses");
        }
        Ok(enqueued)
    }

    /// Run a pass every `every`, starting one interval after launch.
    pub fn spawn(self, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = self.run_once(Utc::now()).await {
                    tracing::warn!(error = %e, "Unresolved address sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use crate::models::{Attendance, PLACEHOLDER_ADDRESS};
    use crate::services::tasks::RecordingQueue;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap()
    }

    fn attendance(user_id: u64, minutes_ago: i64, address: &str) -> Attendance {
        Attendance {
            id: Attendance::document_id(user_id, 3),
            user_id,
            session_id: 3,
            selfie_path: format!("selfies/{}.jpg", user_id),
            latitude: -6.2,
            longitude: 106.816666,
            address: address.to_string(),
            face_detected: true,
            submitted_at: now() - ChronoDuration::minutes(minutes_ago),
        }
    }

    async fn seeded() -> (MemoryDb, RecordingQueue, UnresolvedSweep) {
        let db = MemoryDb::new();
        for record in [
            attendance(1, 30, PLACEHOLDER_ADDRESS),
            attendance(2, 30, "Jalan Margonda, Depok"),
            attendance(3, 2, PLACEHOLDER_ADDRESS),
            attendance(4, 600, PLACEHOLDER_ADDRESS),
            attendance(5, 119, PLACEHOLDER_ADDRESS),
        ] {
            db.insert_attendance(&record).await.unwrap();
        }
        let queue = RecordingQueue::new();
        let sweep = UnresolvedSweep::new(Arc::new(db.clone()), Arc::new(queue.clone()));
        (db, queue, sweep)
    }

    #[tokio::test]
    async fn requeues_only_stale_placeholders() {
        let (_db, queue, sweep) = seeded().await;

        assert_eq!(sweep.run_once(now()).await.unwrap(), 2);

        let mut ids: Vec<String> = queue
            .payloads()
            .await
            .into_iter()
            .map(|p| p.attendance_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["3_1", "3_5"]);
    }

    #[tokio::test]
    async fn failed_enqueue_is_left_for_next_pass() {
        let (_db, queue, sweep) = seeded().await;
        queue.fail_next(1);

        assert_eq!(sweep.run_once(now()).await.unwrap(), 1);
        assert_eq!(sweep.run_once(now()).await.unwrap(), 2);
        assert_eq!(queue.payloads().await.len(), 3);
    }

    #[tokio::test]
    async fn store_outage_is_an_error() {
        let (db, _queue, sweep) = seeded().await;
        db.set_unavailable(true);
        assert!(sweep.run_once(now()).await.is_err());
    }
}
