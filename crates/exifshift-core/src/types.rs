//! Per-file report and batch statistics types.
//!
//! These are what the CLI writes as JSON / JSONL, one record per input file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ErrorKind;
use crate::geocode::Address;
use crate::pipeline::{GeoCoordinate, RejectReason};

/// Outcome of processing one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    /// Path of the source file
    pub input: PathBuf,

    #[serde(flatten)]
    pub status: FileStatus,

    /// Wall time spent on this file, including geocoding
    pub elapsed_ms: u64,
}

/// Terminal state of one file. Serialized with a `status` tag:
/// `{"status":"written",...}`, `{"status":"rejected",...}` or
/// `{"status":"failed",...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Written {
        output: PathBuf,
        width: u32,
        height: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<GeoCoordinate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<Address>,
        /// Source metadata was malformed and dropped
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        metadata_degraded: bool,
    },
    Rejected {
        reason: RejectReason,
        /// The source file was removed on request
        source_deleted: bool,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

impl FileStatus {
    pub fn is_written(&self) -> bool {
        matches!(self, FileStatus::Written { .. })
    }
}

/// Processing statistics for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProcessingStats {
    /// Files rewritten to JPEG
    pub written: usize,

    /// Files rejected by the content policy
    pub rejected: usize,

    /// Files that failed
    pub failed: usize,

    /// Processing rate in files per second
    pub files_per_second: f64,

    /// Total processing time in seconds
    pub total_seconds: f64,
}

impl ProcessingStats {
    /// Count one finished file.
    pub fn record(&mut self, status: &FileStatus) {
        match status {
            FileStatus::Written { .. } => self.written += 1,
            FileStatus::Rejected { .. } => self.rejected += 1,
            FileStatus::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.written + self.rejected + self.failed
    }

    /// Set the timing fields from the batch's elapsed time.
    pub fn finish(&mut self, elapsed: std::time::Duration) {
        self.total_seconds = elapsed.as_secs_f64();
        self.files_per_second = if self.total_seconds > 0.0 {
            self.total() as f64 / self.total_seconds
        } else {
            0.0
        };
    }
}
