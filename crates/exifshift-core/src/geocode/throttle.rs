//! Minimum-interval rate limiting for a geocoder.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::provider::{Address, ReverseGeocoder};
use crate::error::PipelineError;

/// Serializes lookups and spaces their starts at least `min_interval` apart.
pub struct Throttled<G> {
    inner: G,
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl<G: ReverseGeocoder> Throttled<G> {
    pub fn new(inner: G, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[async_trait]
impl<G: ReverseGeocoder> ReverseGeocoder for Throttled<G> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
        language: &str,
    ) -> Result<Option<Address>, PipelineError> {
        // Held for the whole call so concurrent callers queue up.
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let ready_at = last + self.min_interval;
            if ready_at > Instant::now() {
                tracing::trace!("Throttling {} lookup", self.inner.name());
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_call = Some(Instant::now());
        self.inner.reverse(latitude, longitude, language).await
    }
}
