// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Course material model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A handout, slide deck, or external resource for the course.
///
/// Materials are authored by administrators; students only see the
/// published ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Material {
    /// Material ID (also used as document ID)
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Uploaded file, relative to the material storage root
    #[serde(default)]
    pub file_path: Option<String>,
    /// External URL, for materials hosted elsewhere
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Material {
    pub fn new(id: u64, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            file_path: None,
            link: None,
            is_published: false,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn missing_optional_fields_default() {
        let json = serde_json::json!({
            "id": 4,
            "title": "Sorting.pdf",
            "created_at": "2026-09-01T08:00:00Z",
        });
        let material: Material = serde_json::from_value(json).unwrap();

        assert_eq!(material.title, "Sorting.pdf");
        assert!(!material.is_published);
        assert!(material.link.is_none());
        assert_eq!(
            material.created_at,
            Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap()
        );
    }
}
