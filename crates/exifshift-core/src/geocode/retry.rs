//! Retry utilities for transient geocoding failures.
//!
//! Provides classification of retryable errors and exponential backoff.

use std::time::Duration;

use super::provider::{Address, ReverseGeocoder};
use crate::config::GeocodeConfig;
use crate::error::PipelineError;

/// Retry and timeout settings for one lookup.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub attempts: u32,
    /// Base backoff delay in milliseconds
    pub delay_ms: u64,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
}

impl From<&GeocodeConfig> for RetryPolicy {
    fn from(config: &GeocodeConfig) -> Self {
        Self {
            attempts: config.retry_attempts,
            delay_ms: config.retry_delay_ms,
            timeout_ms: config.timeout_ms,
        }
    }
}

/// Determine whether a geocoding error is worth retrying.
///
/// Retryable errors: timeouts, rate limits (429), server errors (5xx).
/// Non-retryable: bad requests, blocked user agents, parse failures.
pub fn is_retryable(error: &PipelineError) -> bool {
    match error {
        PipelineError::Timeout { .. } => true,
        PipelineError::Geocode {
            status_code,
            message,
        } => {
            if let Some(code) = status_code {
                return *code == 429 || (500..=599).contains(code);
            }
            // Non-HTTP failures (connection refused, DNS)
            message.contains("timed out") || message.contains("connect")
        }
        _ => false,
    }
}

/// Calculate exponential backoff duration for a given attempt.
///
/// Uses `base_delay * 2^attempt` with a cap at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}

/// Reverse geocode with a per-attempt timeout and retries on transient
/// errors. Returns the last error once attempts are exhausted.
pub async fn reverse_with_retry(
    geocoder: &dyn ReverseGeocoder,
    latitude: f64,
    longitude: f64,
    language: &str,
    policy: RetryPolicy,
) -> Result<Option<Address>, PipelineError> {
    let mut last_error = None;
    for attempt in 0..=policy.attempts {
        if attempt > 0 {
            let delay = backoff_duration(attempt - 1, policy.delay_ms);
            tracing::debug!(
                "Retry {attempt}/{} for ({latitude}, {longitude}) after {delay:?}",
                policy.attempts
            );
            tokio::time::sleep(delay).await;
        }

        let err = match tokio::time::timeout(
            Duration::from_millis(policy.timeout_ms),
            geocoder.reverse(latitude, longitude, language),
        )
        .await
        {
            Ok(Ok(address)) => return Ok(address),
            Ok(Err(e)) => e,
            Err(_) => PipelineError::Timeout {
                path: format!("({latitude}, {longitude})").into(),
                stage: "geocode".to_string(),
                timeout_ms: policy.timeout_ms,
            },
        };
        let retryable = is_retryable(&err);
        last_error = Some(err);
        if !retryable {
            break;
        }
    }
    Err(last_error.unwrap_or_else(|| PipelineError::Geocode {
        message: "no attempt made".to_string(),
        status_code: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given status for the first `failures` calls.
    struct Flaky {
        failures: u32,
        status: Option<u16>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ReverseGeocoder for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn reverse(
            &self,
            _latitude: f64,
            _longitude: f64,
            _language: &str,
        ) -> Result<Option<Address>, PipelineError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(PipelineError::Geocode {
                    message: "HTTP error".to_string(),
                    status_code: self.status,
                });
            }
            Ok(Some(Address {
                full_address: "Recovered".to_string(),
                ..Default::default()
            }))
        }
    }

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay_ms: 5,
            timeout_ms: 5000,
        }
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = PipelineError::Timeout {
            path: PathBuf::from("(1, 2)"),
            stage: "geocode".to_string(),
            timeout_ms: 10000,
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_status_classification() {
        let err = |code| PipelineError::Geocode {
            message: String::new(),
            status_code: Some(code),
        };
        assert!(is_retryable(&err(429)));
        assert!(is_retryable(&err(503)));
        assert!(!is_retryable(&err(403)));
    }

    #[test]
    fn test_connection_error_retryable_without_status() {
        let err = PipelineError::Geocode {
            message: "error trying to connect: dns error".to_string(),
            status_code: None,
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_backoff_exponential_and_capped() {
        assert_eq!(backoff_duration(0, 1000), Duration::from_millis(1000));
        assert_eq!(backoff_duration(2, 1000), Duration::from_millis(4000));
        assert_eq!(backoff_duration(10, 1000), Duration::from_millis(30_000));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_rate_limit() {
        let geocoder = Flaky {
            failures: 1,
            status: Some(429),
            calls: AtomicU32::new(0),
        };
        let address = reverse_with_retry(&geocoder, 1.0, 2.0, "en", fast(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(address.full_address, "Recovered");
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_retry_on_client_error() {
        let geocoder = Flaky {
            failures: 5,
            status: Some(403),
            calls: AtomicU32::new(0),
        };
        let err = reverse_with_retry(&geocoder, 1.0, 2.0, "en", fast(3))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Geocode { status_code: Some(403), .. }));
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let geocoder = Flaky {
            failures: 10,
            status: Some(500),
            calls: AtomicU32::new(0),
        };
        assert!(reverse_with_retry(&geocoder, 1.0, 2.0, "en", fast(2))
            .await
            .is_err());
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 3);
    }
}
