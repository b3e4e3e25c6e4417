//! Metadata mutation: device override, time-preserving date override and
//! orientation stripping.

use chrono::{Datelike, NaiveDate, NaiveTime};
use exif::Tag;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::metadata::{MetadataSegment, TagValue};

/// Time written when the image carries no usable timestamp.
const DEFAULT_TIME: &str = "12:00:00";
const EXIF_DATE_FORMAT: &str = "%Y:%m:%d";
const EXIF_TIME_FORMAT: &str = "%H:%M:%S";

/// What to do with the orientation tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrientationPolicy {
    /// Remove the tag, leaving pixels as stored
    #[default]
    Strip,
    /// Leave the tag untouched
    Keep,
    /// Rotate pixels upright, then remove the tag
    Correct,
}

/// Per-run mutation parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationRequest {
    /// Replacement device model
    pub device: Option<String>,
    /// Replacement calendar date; time of day is preserved
    pub date: Option<NaiveDate>,
    pub orientation: OrientationPolicy,
}

impl MutationRequest {
    /// Reject requests that cannot be written. Runs before any mutation.
    pub fn validate(&self) -> PipelineResult<()> {
        if let Some(device) = &self.device {
            if device.contains('\0') {
                return Err(PipelineError::validation(
                    "device string contains a NUL byte",
                ));
            }
        }
        if let Some(date) = self.date {
            if !(1..=9999).contains(&date.year()) {
                return Err(PipelineError::validation(format!(
                    "date {date} is not representable as an Exif timestamp"
                )));
            }
        }
        Ok(())
    }
}

/// Apply a request to a segment. On error the segment is left unchanged.
pub fn apply(segment: &mut MetadataSegment, request: &MutationRequest) -> PipelineResult<()> {
    request.validate()?;

    if let Some(device) = &request.device {
        segment.set(Tag::Model, TagValue::ascii(device.as_str()))?;
    }

    if let Some(date) = request.date {
        let time = preserved_time(segment);
        let stamp = format!("{} {}", date.format(EXIF_DATE_FORMAT), time);
        for tag in [Tag::DateTime, Tag::DateTimeOriginal, Tag::DateTimeDigitized] {
            segment.set(tag, TagValue::ascii(stamp.as_str()))?;
        }
    }

    if request.orientation != OrientationPolicy::Keep {
        strip_orientation(segment);
    }
    Ok(())
}

/// Remove the orientation tag. Absent tag or group is a no-op.
pub fn strip_orientation(segment: &mut MetadataSegment) -> Option<TagValue> {
    segment.remove(Tag::Orientation)
}

/// Time of day from DateTime, then DateTimeOriginal; `12:00:00` otherwise.
fn preserved_time(segment: &MetadataSegment) -> String {
    [Tag::DateTime, Tag::DateTimeOriginal]
        .into_iter()
        .filter_map(|tag| segment.get_ascii(tag))
        .find_map(time_of_day)
        .unwrap_or_else(|| DEFAULT_TIME.to_string())
}

fn time_of_day(stamp: &str) -> Option<String> {
    let (_, time) = stamp.trim_end_matches('\0').trim().split_once(' ')?;
    let parsed = NaiveTime::parse_from_str(time.trim(), EXIF_TIME_FORMAT).ok()?;
    Some(parsed.format(EXIF_TIME_FORMAT).to_string())
}
