//! Pixel-level orientation correction.

use exif::Tag;
use image::DynamicImage;

use super::decode::PixelBuffer;
use crate::error::{PipelineError, PipelineResult};
use crate::metadata::MetadataSegment;

/// EXIF orientation values (1-8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90Cw,
    Transverse,
    Rotate270Cw,
}

impl Orientation {
    /// Out-of-range values read as `Normal`.
    pub fn from_exif(value: u32) -> Self {
        match value {
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90Cw,
            7 => Self::Transverse,
            8 => Self::Rotate270Cw,
            _ => Self::Normal,
        }
    }

    pub fn of(segment: &MetadataSegment) -> Self {
        segment
            .get(Tag::Orientation)
            .and_then(|v| v.first_uint())
            .map(Self::from_exif)
            .unwrap_or_default()
    }

    fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => img,
            Self::FlipHorizontal => img.fliph(),
            Self::Rotate180 => img.rotate180(),
            Self::FlipVertical => img.flipv(),
            Self::Transpose => img.rotate90().fliph(),
            Self::Rotate90Cw => img.rotate90(),
            Self::Transverse => img.rotate270().fliph(),
            Self::Rotate270Cw => img.rotate270(),
        }
    }
}

/// Produce an upright copy of `pixels`. `Normal` returns `None`, leaving the
/// original buffer in use.
pub fn correct(pixels: &PixelBuffer, orientation: Orientation) -> PipelineResult<Option<PixelBuffer>> {
    if orientation == Orientation::Normal {
        return Ok(None);
    }
    let image = pixels.to_dynamic().map_err(PipelineError::container)?;
    Ok(Some(PixelBuffer::from_dynamic(orientation.apply(image))))
}
