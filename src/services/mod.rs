// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod blob;
pub mod enricher;
pub mod geo;
pub mod geocoding;
pub mod guard;
pub mod payload;
pub mod settings;
pub mod sweep;
pub mod tasks;
pub mod window;

pub use blob::{BlobStore, LocalBlobStore, MemoryBlobStore};
pub use enricher::{AddressEnricher, EnrichOutcome};
pub use geocoding::{GeocodeError, Geocoder, NominatimGeocoder};
pub use guard::{AttendanceGuard, AttendanceSummary};
pub use payload::{SelfieUpload, SubmissionPayload};
pub use settings::SettingsService;
pub use sweep::UnresolvedSweep;
pub use tasks::{EnrichAddressPayload, LocalTaskQueue, RecordingQueue, TaskQueue, TasksService};
