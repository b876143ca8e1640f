// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reverse geocoding (coordinates to a human-readable address).

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Why a lookup produced no address.
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("Geocoder request timed out")]
    Timeout,

    #[error("Geocoder transport error: {0}")]
    Transport(String),

    #[error("Geocoder returned HTTP {0}")]
    Status(u16),

    #[error("Geocoder returned no address")]
    Empty,

    #[error("Failed to parse geocoder response: {0}")]
    Parse(String),
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Result<String, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    display_name: Option<String>,
}

/// Nominatim `/reverse` client.
#[derive(Clone)]
pub struct NominatimGeocoder {
    http: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    /// Nominatim's usage policy requires an identifying User-Agent.
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Result<String, GeocodeError> {
        let url = format!("{}/reverse", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeocodeError::Timeout
                } else {
                    GeocodeError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }

        let body: ReverseResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GeocodeError::Timeout
            } else {
                GeocodeError::Parse(e.to_string())
            }
        })?;

        extract_address(body)
    }
}

fn extract_address(body: ReverseResponse) -> Result<String, GeocodeError> {
    body.display_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or(GeocodeError::Empty)
}
