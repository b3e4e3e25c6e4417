//! Metadata-only report for a single file.
//!
//! Never decodes pixels, so HEIF files whose image codec is not registered
//! can still be inspected.

use chrono::NaiveDateTime;
use exif::Tag;
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::gps::GeoCoordinate;
use super::policy::{self, PolicyVerdict, RejectReason};
use super::run::Pipeline;
use crate::geocode::Address;
use crate::metadata::{self, MetadataSegment};

const EXIF_STAMP: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Debug, Clone, Default, Serialize)]
pub struct InspectReport {
    pub file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Raw `DateTime` (falling back to `DateTimeOriginal`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
    /// Capture date as `DD/MM/YYYY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoCoordinate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Reason the file would be rejected by `process`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<RejectReason>,
    /// Why fields are missing: unreadable container, malformed metadata,
    /// or an unusable coordinate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl InspectReport {
    fn from_segment(file: &Path, segment: &MetadataSegment) -> Self {
        let text = |tag: Tag| {
            segment
                .get_text(tag)
                .map(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string())
                .filter(|s| !s.is_empty())
        };

        let captured_at = text(Tag::DateTime).or_else(|| text(Tag::DateTimeOriginal));
        let capture_date = captured_at.as_deref().and_then(display_date);

        let (location, note) = match GeoCoordinate::from_segment(segment) {
            Ok(location) => (location, None),
            Err(e) => (None, Some(format!("GPS data unusable: {e}"))),
        };

        let rejected = match policy::evaluate(segment) {
            PolicyVerdict::Reject(reason) => Some(reason),
            PolicyVerdict::Continue => None,
        };

        Self {
            file: file.to_path_buf(),
            make: text(Tag::Make),
            model: text(Tag::Model),
            captured_at,
            capture_date,
            orientation: segment.get(Tag::Orientation).and_then(|v| v.first_uint()),
            location,
            address: None,
            rejected,
            note,
        }
    }

    fn unreadable(file: &Path, note: String) -> Self {
        Self {
            file: file.to_path_buf(),
            note: Some(note),
            ..Self::default()
        }
    }

    pub fn with_address(mut self, address: Option<Address>) -> Self {
        self.address = address;
        self
    }
}

/// `2023:05:01 14:22:09` → `01/05/2023`. Date-only stamps are accepted.
pub fn display_date(stamp: &str) -> Option<String> {
    let stamp = stamp.trim_end_matches('\0').trim();
    let date = match NaiveDateTime::parse_from_str(stamp, EXIF_STAMP) {
        Ok(dt) => dt.date(),
        Err(_) => {
            let day = stamp.split_whitespace().next()?;
            chrono::NaiveDate::parse_from_str(day, "%Y:%m:%d").ok()?
        }
    };
    Some(date.format("%d/%m/%Y").to_string())
}

/// Build a report from a file's bytes. Failures become a `note` on an
/// otherwise empty report.
pub fn inspect(pipeline: &Pipeline, bytes: &[u8], hint: &Path) -> InspectReport {
    let blob = match pipeline.decoder(hint).and_then(|d| d.read_metadata(bytes)) {
        Ok(blob) => blob,
        Err(e) => {
            let e = e.with_path(hint);
            tracing::debug!("Cannot read metadata from {:?}: {}", hint, e);
            return InspectReport::unreadable(hint, e.to_string());
        }
    };

    match metadata::parse(blob.as_deref()) {
        Ok(segment) => InspectReport::from_segment(hint, &segment),
        Err(e) => {
            tracing::warn!("Malformed metadata in {:?}: {}", hint, e);
            InspectReport::unreadable(hint, format!("Metadata degraded: {e}"))
        }
    }
}
