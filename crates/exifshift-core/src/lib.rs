//! ExifShift Core - photo metadata rewriting library.
//!
//! ExifShift takes a HEIC/HEIF or JPEG photo, reads its Exif segment, rejects
//! images carrying unwanted editing markers, rewrites the device model and
//! capture date, drops the orientation tag, and re-encodes the result as a
//! JPEG with the edited Exif attached.
//!
//! # Architecture
//!
//! ```text
//! Bytes → Decode → Parse Exif → Policy → [Orient] → Mutate → Encode → JPEG
//!                                  └→ Rejected
//! ```
//!
//! The single-image pipeline is synchronous and pure. [`FileProcessor`] adds
//! file I/O, limits and timeouts on top; reverse geocoding of the embedded
//! GPS position is an optional async collaborator ([`geocode`]).
//!
//! # Usage
//!
//! ```rust,no_run
//! use exifshift_core::{run_pipeline, MutationRequest, PipelineOutcome};
//! use std::path::Path;
//!
//! let bytes = std::fs::read("IMG_0001.HEIC").unwrap();
//! let request = MutationRequest {
//!     device: Some("Pixel 8".to_string()),
//!     date: chrono::NaiveDate::from_ymd_opt(2024, 12, 25),
//!     ..MutationRequest::default()
//! };
//!
//! match run_pipeline(&bytes, Path::new("IMG_0001.HEIC"), &request) {
//!     PipelineOutcome::Success(out) => std::fs::write(&out.file_name, &out.bytes).unwrap(),
//!     PipelineOutcome::Rejected(reason) => eprintln!("rejected: {reason}"),
//!     PipelineOutcome::Failed { kind, message } => eprintln!("{kind}: {message}"),
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod geocode;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod types;

#[cfg(test)]
mod testutil;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, ErrorKind, PipelineError, PipelineResult, Result, ShiftError};
pub use metadata::MetadataSegment;
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{
    run_pipeline, FileProcessor, GeocodeOptions, MutationRequest, OrientationPolicy, Pipeline,
    PipelineOutcome, ProcessOptions, RejectReason,
};
pub use types::{FileReport, FileStatus, ProcessingStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
