//! OpenStreetMap Nominatim reverse geocoder.
//!
//! Calls the JSON `reverse` endpoint. Nominatim's usage policy requires an
//! identifying User-Agent and at most one request per second; wrap this in
//! [`Throttled`](super::Throttled) for batch use.

use super::provider::{Address, ReverseGeocoder};
use crate::config::GeocodeConfig;
use crate::error::PipelineError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub struct NominatimGeocoder {
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodeConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| PipelineError::Geocode {
                message: format!("Cannot build HTTP client: {e}"),
                status_code: None,
            })?;
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client,
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }
}

/// `/reverse?format=json` response. Failures come back as `{"error": ...}`
/// with status 200.
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    address: Option<AddressParts>,
}

#[derive(Debug, Default, Deserialize)]
struct AddressParts {
    suburb: Option<String>,
    neighbourhood: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    region: Option<String>,
    country: Option<String>,
}

impl ReverseResponse {
    fn into_address(self) -> Option<Address> {
        if let Some(error) = self.error {
            tracing::debug!("Nominatim: {}", error);
            return None;
        }
        let full_address = self.display_name?;
        let parts = self.address.unwrap_or_default();
        Some(Address {
            place: parts.suburb.or(parts.neighbourhood),
            city: parts.city.or(parts.town).or(parts.village),
            administrative_area: parts.state.or(parts.region),
            country: parts.country,
            full_address,
        })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
        language: &str,
    ) -> Result<Option<Address>, PipelineError> {
        let url = format!("{}/reverse", self.endpoint);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("format", "json".to_string()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("accept-language", language.to_string()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PipelineError::Geocode {
                message: format!("Nominatim request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Geocode {
                message: format!("Nominatim HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let body: ReverseResponse = resp.json().await.map_err(|e| PipelineError::Geocode {
            message: format!("Failed to parse Nominatim response: {e}"),
            status_code: None,
        })?;
        Ok(body.into_address())
    }
}
