//! Error types for the ExifShift metadata pipeline.
//!
//! Errors are organized by stage to provide clear, actionable error messages
//! that include relevant context (file paths, stage names, specific issues).
//! Every pipeline error maps onto one [`ErrorKind`], which is what a per-file
//! outcome reports.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level error type for ExifShift operations.
#[derive(Error, Debug)]
pub enum ShiftError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Container or pixel block is malformed
    #[error("Format error for {path}: {message}")]
    Format { path: PathBuf, message: String },

    /// Metadata directory is malformed
    #[error("Metadata parse error: {message}")]
    Parse { message: String },

    /// A rational value could not be evaluated
    #[error("Numeric error: {message}")]
    Numeric { message: String },

    /// The mutation request is not applicable
    #[error("Invalid mutation request: {message}")]
    Validation { message: String },

    /// Raster encoding failed
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// Reading or writing a file failed
    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported image format (by extension)
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Reverse geocoding failed
    #[error("Geocoding error: {message}")]
    Geocode {
        message: String,
        status_code: Option<u16>,
    },
}

/// Error classification reported in per-file outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FormatError,
    ParseError,
    NumericError,
    ValidationError,
    EncodeError,
    IoError,
    Timeout,
    GeocodeError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::FormatError => "format_error",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::NumericError => "numeric_error",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::EncodeError => "encode_error",
            ErrorKind::IoError => "io_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::GeocodeError => "geocode_error",
        };
        f.write_str(name)
    }
}

impl PipelineError {
    /// The outcome classification for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Format { .. }
            | PipelineError::ImageTooLarge { .. }
            | PipelineError::UnsupportedFormat { .. } => ErrorKind::FormatError,
            PipelineError::Parse { .. } => ErrorKind::ParseError,
            PipelineError::Numeric { .. } => ErrorKind::NumericError,
            PipelineError::Validation { .. } | PipelineError::FileTooLarge { .. } => {
                ErrorKind::ValidationError
            }
            PipelineError::Encode { .. } => ErrorKind::EncodeError,
            PipelineError::Io { .. } | PipelineError::FileNotFound(_) => ErrorKind::IoError,
            PipelineError::Timeout { .. } => ErrorKind::Timeout,
            PipelineError::Geocode { .. } => ErrorKind::GeocodeError,
        }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PipelineError::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Format error raised below the file layer; the path is filled in by
    /// [`PipelineError::with_path`].
    pub(crate) fn container(message: impl Into<String>) -> Self {
        Self::format(PathBuf::new(), message)
    }

    /// Attach a file path to format and encode errors raised without one.
    pub fn with_path(mut self, file: &Path) -> Self {
        match &mut self {
            PipelineError::Format { path, .. } | PipelineError::Encode { path, .. }
                if path.as_os_str().is_empty() =>
            {
                *path = file.to_path_buf();
            }
            _ => {}
        }
        self
    }

    pub(crate) fn encode(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PipelineError::Encode {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        PipelineError::Parse {
            message: message.into(),
        }
    }

    pub(crate) fn numeric(message: impl Into<String>) -> Self {
        PipelineError::Numeric {
            message: message.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation {
            message: message.into(),
        }
    }
}

/// Convenience type alias for ExifShift results.
pub type Result<T> = std::result::Result<T, ShiftError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
