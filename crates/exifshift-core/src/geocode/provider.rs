//! Geocoder trait and address type.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// A structured postal address for a coordinate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    /// Neighbourhood, suburb or named place
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// State, province or region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub administrative_area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub full_address: String,
}

/// Trait that all reverse geocoding backends implement.
///
/// Uses `async_trait` so backends can be shared as `Arc<dyn ReverseGeocoder>`.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Look up the address at a coordinate. `Ok(None)` means the service
    /// answered but knows no address there.
    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
        language: &str,
    ) -> Result<Option<Address>, PipelineError>;
}
