//! Command implementations.

pub mod config;
pub mod inspect;
pub mod process;

use exifshift_core::config::GeocodeConfig;
use exifshift_core::geocode::{NominatimGeocoder, Throttled};
use exifshift_core::GeocodeOptions;
use std::sync::Arc;
use std::time::Duration;

/// Nominatim client behind the configured minimum request interval.
pub(crate) fn nominatim(config: &GeocodeConfig) -> anyhow::Result<GeocodeOptions> {
    let geocoder = NominatimGeocoder::new(config)?;
    let throttled = Throttled::new(geocoder, Duration::from_millis(config.min_interval_ms));
    tracing::debug!(
        "Geocoding via {} (min interval {:?})",
        config.endpoint,
        throttled.min_interval()
    );
    Ok(GeocodeOptions::new(Arc::new(throttled), config))
}
