// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Submission payload parsing and validation.
//!
//! Multipart fields arrive as raw strings and bytes; this module turns them
//! into a typed payload or the list of offending field names.

use crate::error::AttendanceError;
use crate::services::geo::is_valid_coordinate;
use axum::body::Bytes;
use validator::Validate;

/// Selfie size ceiling (5 MiB).
pub const MAX_SELFIE_BYTES: usize = 5 * 1024 * 1024;

pub const FIELD_SELFIE: &str = "selfie";
pub const FIELD_LATITUDE: &str = "latitude";
pub const FIELD_LONGITUDE: &str = "longitude";
pub const FIELD_FACE_DETECTED: &str = "face_detected";

/// Order in which invalid fields are reported.
const FIELD_ORDER: [&str; 4] = [
    FIELD_SELFIE,
    FIELD_LATITUDE,
    FIELD_LONGITUDE,
    FIELD_FACE_DETECTED,
];

/// The selfie part of a submission.
///
/// The declared file name and content type are not kept; the format is
/// sniffed from the bytes.
#[derive(Debug, Clone)]
pub enum SelfieUpload {
    Received(Bytes),
    /// The body could not be read to the end, usually because it ran past
    /// the request size limit. Reported as an invalid selfie; fields that
    /// never arrived are not reported.
    Unreadable,
}

/// Raw submission fields; every field may be missing.
#[derive(Debug, Clone, Default)]
pub struct SubmissionPayload {
    pub selfie: Option<SelfieUpload>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub face_detected: Option<String>,
}

/// Image formats accepted for selfies, detected from file signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
}

impl ImageKind {
    /// Sniff the format from the leading bytes; the declared content type is
    /// not trusted.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageKind::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else if bytes.len() >= 26 && bytes.starts_with(b"BM") {
            Some(ImageKind::Bmp)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
            ImageKind::Bmp => "bmp",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
            ImageKind::Webp => "image/webp",
            ImageKind::Bmp => "image/bmp",
        }
    }
}

/// Payload that passed validation.
#[derive(Debug, Clone)]
pub struct ValidPayload {
    pub selfie: Bytes,
    pub image: ImageKind,
    pub latitude: f64,
    pub longitude: f64,
    pub face_detected: bool,
}

#[derive(Debug, Validate)]
struct CoordinatesInput {
    #[validate(range(min = -90.0, max = 90.0))]
    latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    longitude: f64,
}

/// Validate every field and report all failures at once.
pub fn validate_payload(payload: &SubmissionPayload) -> Result<ValidPayload, AttendanceError> {
    let mut invalid: Vec<&str> = Vec::new();
    let truncated = matches!(payload.selfie, Some(SelfieUpload::Unreadable));

    let selfie = match &payload.selfie {
        Some(SelfieUpload::Received(bytes))
            if !bytes.is_empty() && bytes.len() <= MAX_SELFIE_BYTES =>
        {
            ImageKind::detect(bytes).map(|kind| (bytes.clone(), kind))
        }
        _ => None,
    };
    if selfie.is_none() {
        invalid.push(FIELD_SELFIE);
    }

    let latitude = parse_number(payload.latitude.as_deref());
    if latitude.is_none() && !(truncated && payload.latitude.is_none()) {
        invalid.push(FIELD_LATITUDE);
    }
    let longitude = parse_number(payload.longitude.as_deref());
    if longitude.is_none() && !(truncated && payload.longitude.is_none()) {
        invalid.push(FIELD_LONGITUDE);
    }

    // Unparsed coordinates are already reported; 0.0 stands in so only
    // parsed values are range-checked.
    let coordinates = CoordinatesInput {
        latitude: latitude.unwrap_or(0.0),
        longitude: longitude.unwrap_or(0.0),
    };
    if let Err(errors) = coordinates.validate() {
        for field in errors.field_errors().keys() {
            match field.as_ref() {
                FIELD_LATITUDE => invalid.push(FIELD_LATITUDE),
                FIELD_LONGITUDE => invalid.push(FIELD_LONGITUDE),
                _ => {}
            }
        }
    }

    let face_detected = parse_face_detected(payload.face_detected.as_deref());
    if face_detected.is_none() && !(truncated && payload.face_detected.is_none()) {
        invalid.push(FIELD_FACE_DETECTED);
    }

    match (selfie, latitude, longitude, face_detected) {
        (Some((selfie, image)), Some(latitude), Some(longitude), Some(face_detected))
            if invalid.is_empty() && is_valid_coordinate(latitude, longitude) =>
        {
            Ok(ValidPayload {
                selfie,
                image,
                latitude,
                longitude,
                face_detected,
            })
        }
        _ => Err(AttendanceError::InvalidPayload(
            FIELD_ORDER
                .iter()
                .filter(|f| invalid.contains(f))
                .map(|f| f.to_string())
                .collect(),
        )),
    }
}

/// Finite decimal number; "NaN" and "inf" are rejected.
fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Accepts `true`, `false`, `1`, `0`.
fn parse_face_detected(raw: Option<&str>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
