//! GPS coordinate conversion from degree/minute/second rationals.

use exif::Tag;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::metadata::{MetadataSegment, Rational};

/// Signed decimal coordinate. South and west are negative, as is an altitude
/// below sea level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

/// Convert a DMS triple and hemisphere reference to decimal degrees.
///
/// `'S'` and `'W'` negate the result; any other reference, lowercase
/// included, is positive.
pub fn to_decimal(
    degrees: Rational,
    minutes: Rational,
    seconds: Rational,
    hemisphere: char,
) -> PipelineResult<f64> {
    let value = degrees.to_f64()? + minutes.to_f64()? / 60.0 + seconds.to_f64()? / 3600.0;
    let sign = match hemisphere {
        'S' | 'W' => -1.0,
        _ => 1.0,
    };
    Ok(sign * value)
}

impl GeoCoordinate {
    /// Read the coordinate from a segment's GPS group.
    ///
    /// Returns `Ok(None)` when latitude or longitude is missing or not a
    /// three-element rational array.
    pub fn from_segment(segment: &MetadataSegment) -> PipelineResult<Option<Self>> {
        let (Some(latitude), Some(longitude)) = (
            axis(segment, Tag::GPSLatitude, Tag::GPSLatitudeRef)?,
            axis(segment, Tag::GPSLongitude, Tag::GPSLongitudeRef)?,
        ) else {
            return Ok(None);
        };

        let altitude = match segment
            .get(Tag::GPSAltitude)
            .and_then(|v| v.as_rationals())
            .and_then(|r| r.first())
        {
            Some(meters) => {
                let below_sea_level = segment
                    .get(Tag::GPSAltitudeRef)
                    .and_then(|v| v.first_uint())
                    == Some(1);
                let meters = meters.to_f64()?;
                Some(if below_sea_level { -meters } else { meters })
            }
            None => None,
        };

        Ok(Some(Self {
            latitude,
            longitude,
            altitude,
        }))
    }
}

fn axis(segment: &MetadataSegment, value_tag: Tag, ref_tag: Tag) -> PipelineResult<Option<f64>> {
    let Some(dms) = segment.get(value_tag).and_then(|v| v.as_rationals()) else {
        return Ok(None);
    };
    let [d, m, s] = dms else {
        return Ok(None);
    };
    let hemisphere = segment
        .get_ascii(ref_tag)
        .and_then(|r| r.chars().next())
        .unwrap_or('N');
    to_decimal(*d, *m, *s, hemisphere)
        .map(Some)
        .map_err(|e| PipelineError::numeric(format!("{value_tag}: {e}")))
}
