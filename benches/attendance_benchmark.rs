use axum::body::Bytes;
use chrono::{Duration, NaiveDate, Utc};
use class_companion::models::{AttendanceSession, AttendanceSettings};
use class_companion::services::geo::distance_meters;
use class_companion::services::guard::{evaluate, SubmissionContext};
use class_companion::services::{SelfieUpload, SubmissionPayload};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn benchmark_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("haversine");

    group.bench_function("campus_short_hop", |b| {
        b.iter(|| {
            distance_meters(
                black_box(-6.2),
                black_box(106.816666),
                black_box(-6.2004),
                black_box(106.8170),
            )
        })
    });

    group.bench_function("jakarta_to_london", |b| {
        b.iter(|| {
            distance_meters(
                black_box(-6.2),
                black_box(106.816666),
                black_box(51.5074),
                black_box(-0.1278),
            )
        })
    });

    group.finish();
}

fn benchmark_evaluate(c: &mut Criterion) {
    let now = Utc::now();
    let mut session = AttendanceSession::new(
        3,
        "Week 3",
        NaiveDate::from_ymd_opt(2026, 9, 15).expect("valid date"),
    );
    session.attendance_open_at = Some(now - Duration::minutes(5));
    let settings = AttendanceSettings::default();

    // Realistic phone selfie size
    let mut selfie = vec![0xFF, 0xD8, 0xFF, 0xE0];
    selfie.resize(2 * 1024 * 1024, 0);
    let payload = SubmissionPayload {
        selfie: Some(SelfieUpload::Received(Bytes::from(selfie))),
        latitude: Some("-6.2003".to_string()),
        longitude: Some("106.8168".to_string()),
        face_detected: Some("true".to_string()),
    };

    let mut group = c.benchmark_group("submission_checks");

    group.bench_function("accepted_submission", |b| {
        b.iter(|| {
            let ctx = SubmissionContext {
                existing: None,
                session: &session,
                payload: black_box(&payload),
                settings: &settings,
                now,
            };
            evaluate(&ctx)
        })
    });

    let far = SubmissionPayload {
        latitude: Some("51.5074".to_string()),
        longitude: Some("-0.1278".to_string()),
        ..payload.clone()
    };
    group.bench_function("rejected_out_of_range", |b| {
        b.iter(|| {
            let ctx = SubmissionContext {
                existing: None,
                session: &session,
                payload: black_box(&far),
                settings: &settings,
                now,
            };
            evaluate(&ctx)
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_distance, benchmark_evaluate);
criterion_main!(benches);
