//! Input validation before processing.

use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Validates files before and after decoding.
#[derive(Debug, Clone)]
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Quick checks before the file is read.
    ///
    /// Checks:
    /// - File exists and its metadata is readable
    /// - File size is within limits
    ///
    /// Returns the file size in bytes.
    pub fn validate(&self, path: &Path) -> Result<u64, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }

        let metadata = std::fs::metadata(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if metadata.len() > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        Ok(metadata.len())
    }

    /// Check the leading bytes of a file already read into memory.
    pub fn check_header(&self, path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
        if bytes.len() < 4 {
            return Err(PipelineError::format(
                path,
                "File too small to be a valid image",
            ));
        }
        if !Self::is_valid_image_header(bytes) {
            return Err(PipelineError::format(
                path,
                "Unrecognized image format (invalid magic bytes)",
            ));
        }
        Ok(())
    }

    /// Reject decoded images larger than `max_image_dimension` on either side.
    pub fn check_dimensions(&self, path: &Path, width: u32, height: u32) -> Result<(), PipelineError> {
        let max_dim = self.limits.max_image_dimension;
        if width > max_dim || height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width,
                height,
                max_dim,
            });
        }
        Ok(())
    }

    /// JPEG, PNG, or an ISO-BMFF `ftyp` box.
    fn is_valid_image_header(header: &[u8]) -> bool {
        // JPEG: FF D8 FF
        if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return true;
        }

        // PNG: 89 50 4E 47
        if header.starts_with(b"\x89PNG") {
            return true;
        }

        // HEIC/HEIF: ftyp box at offset 4
        header.len() >= 12 && &header[4..8] == b"ftyp"
    }
}
