//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of files processed concurrently
    pub parallel_workers: usize,

    /// Supported input extensions
    pub supported_formats: Vec<String>,

    /// Descend into subdirectories when given a directory
    pub recursive: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 4,
            supported_formats: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "heic".to_string(),
                "heif".to_string(),
            ],
            recursive: false,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Per-file pipeline timeout in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 16384,
            decode_timeout_ms: 30000,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JPEG quality for rewritten images (1-100)
    pub jpeg_quality: u8,

    /// Suffix of the default output directory (`<input dir><suffix>`)
    pub dir_suffix: String,

    /// Fixed output directory, overriding the suffix rule (supports `~`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Report format ("json" or "jsonl")
    pub format: String,

    /// Pretty-print JSON reports
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 95,
            dir_suffix: "_output".to_string(),
            dir: None,
            format: "json".to_string(),
            pretty: false,
        }
    }
}

/// Reverse geocoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    /// Nominatim-compatible API base URL
    pub endpoint: String,

    /// User-Agent sent with every request
    pub user_agent: String,

    /// Preferred language for address names
    pub language: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Minimum spacing between requests in milliseconds
    pub min_interval_ms: u64,

    /// Max retry attempts for transient failures
    pub retry_attempts: u32,

    /// Base backoff delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: format!("exifshift/{}", env!("CARGO_PKG_VERSION")),
            language: "en".to_string(),
            timeout_ms: 10000,
            min_interval_ms: 1000,
            retry_attempts: 2,
            retry_delay_ms: 1000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
