//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.parallel_workers == 0 {
            return Err(ConfigError::ValidationError(
                "processing.parallel_workers must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(ConfigError::ValidationError(
                "output.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if self.output.dir.is_none() && self.output.dir_suffix.is_empty() {
            return Err(ConfigError::ValidationError(
                "output.dir_suffix must not be empty when output.dir is unset".into(),
            ));
        }
        if self.geocode.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "geocode.timeout_ms must be > 0".into(),
            ));
        }
        if self.geocode.user_agent.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "geocode.user_agent must not be empty".into(),
            ));
        }
        Ok(())
    }
}
