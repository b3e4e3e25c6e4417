//! CLI value types for the process command: output format, orientation
//! handling, and request-date parsing.

use chrono::NaiveDate;
use clap::ValueEnum;
use exifshift_core::{OrientationPolicy, OutputFormat as CoreOutputFormat};

/// Supported report formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON array
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl From<OutputFormat> for CoreOutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => CoreOutputFormat::Json,
            OutputFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}

/// What to do with the Exif orientation tag.
#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum Orientation {
    /// Remove the tag, leave pixels as stored (default)
    #[default]
    Strip,
    /// Keep the tag as is
    Keep,
    /// Rotate pixels upright, then remove the tag
    Correct,
}

impl From<Orientation> for OrientationPolicy {
    fn from(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Strip => OrientationPolicy::Strip,
            Orientation::Keep => OrientationPolicy::Keep,
            Orientation::Correct => OrientationPolicy::Correct,
        }
    }
}

/// Accepted `--date` spellings, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y:%m:%d"];

/// Parse a request date: `YYYY-MM-DD`, `DD/MM/YYYY` or `YYYY:MM:DD`.
pub fn parse_request_date(s: &str) -> Result<NaiveDate, String> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .ok_or_else(|| format!("invalid date '{s}': expected YYYY-MM-DD, DD/MM/YYYY or YYYY:MM:DD"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
        assert_eq!(parse_request_date("2024-12-25"), Ok(expected));
        assert_eq!(parse_request_date("25/12/2024"), Ok(expected));
        assert_eq!(parse_request_date("2024:12:25"), Ok(expected));
        assert_eq!(parse_request_date(" 2024-12-25 "), Ok(expected));
    }

    #[test]
    fn test_parse_request_date_rejects_invalid() {
        assert!(parse_request_date("2024-02-30").is_err());
        assert!(parse_request_date("12/25/2024").is_err());
        assert!(parse_request_date("tomorrow").unwrap_err().contains("tomorrow"));
    }

    #[test]
    fn test_orientation_maps_to_policy() {
        assert_eq!(
            OrientationPolicy::from(Orientation::default()),
            OrientationPolicy::Strip
        );
        assert_eq!(
            OrientationPolicy::from(Orientation::Correct),
            OrientationPolicy::Correct
        );
    }
}
