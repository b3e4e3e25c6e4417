//! JPEG encoding with an attached Exif segment.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use img_parts::{jpeg::Jpeg, Bytes, ImageEXIF};
use std::path::PathBuf;

use super::decode::{PixelBuffer, PixelLayout};
use crate::error::{PipelineError, PipelineResult};
use crate::metadata::{self, MetadataSegment};

/// Largest TIFF payload one APP1 segment holds: its 16-bit length counts
/// the length field and the `Exif\0\0` header.
pub const MAX_EXIF_PAYLOAD: usize = u16::MAX as usize - 2 - 6;

/// Encodes pixel buffers as JPEG and embeds serialized metadata as APP1.
#[derive(Debug, Clone, Copy)]
pub struct JpegWriter {
    quality: u8,
}

impl Default for JpegWriter {
    fn default() -> Self {
        Self::new(95)
    }
}

impl JpegWriter {
    /// Quality is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode pixels and attach `segment`. A missing or empty segment
    /// produces a JPEG without an Exif chunk.
    ///
    /// Metadata that does not fit one APP1 segment loses its embedded
    /// thumbnail first; if it still does not fit, encoding fails.
    pub fn encode(
        &self,
        pixels: &PixelBuffer,
        segment: Option<&MetadataSegment>,
    ) -> PipelineResult<Vec<u8>> {
        let jpeg = self.encode_pixels(pixels)?;

        let blob = match segment {
            Some(seg) => fitting_blob(seg)?,
            None => None,
        };
        let Some(blob) = blob else {
            return Ok(jpeg);
        };

        let mut container = Jpeg::from_bytes(jpeg.into())
            .map_err(|e| PipelineError::encode(PathBuf::new(), e.to_string()))?;
        container.set_exif(Some(Bytes::from(blob)));
        Ok(container.encoder().bytes().to_vec())
    }

    fn encode_pixels(&self, pixels: &PixelBuffer) -> PipelineResult<Vec<u8>> {
        if pixels.width == 0 || pixels.height == 0 {
            return Err(PipelineError::encode(
                PathBuf::new(),
                format!(
                    "Invalid dimensions: {}x{} must be non-zero",
                    pixels.width, pixels.height
                ),
            ));
        }
        let image = pixels
            .to_dynamic()
            .map_err(|msg| PipelineError::encode(PathBuf::new(), msg))?;

        // JPEG has no alpha channel.
        let (data, color) = match pixels.layout {
            PixelLayout::Luma8 => (image.into_luma8().into_raw(), ExtendedColorType::L8),
            PixelLayout::Rgb8 | PixelLayout::Rgba8 => {
                (image.into_rgb8().into_raw(), ExtendedColorType::Rgb8)
            }
        };

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .write_image(&data, pixels.width, pixels.height, color)
            .map_err(|e| PipelineError::encode(PathBuf::new(), format!("JPEG encoding failed: {e}")))?;
        Ok(out)
    }
}

fn serialize(segment: &MetadataSegment) -> PipelineResult<Option<Vec<u8>>> {
    metadata::serialize(segment).map_err(|e| {
        PipelineError::encode(PathBuf::new(), format!("Cannot serialize metadata: {e}"))
    })
}

fn fitting_blob(segment: &MetadataSegment) -> PipelineResult<Option<Vec<u8>>> {
    let mut blob = serialize(segment)?;
    let oversized = |b: &Option<Vec<u8>>| b.as_ref().is_some_and(|b| b.len() > MAX_EXIF_PAYLOAD);

    if oversized(&blob) && segment.thumbnail.is_some() {
        tracing::warn!(
            "Metadata exceeds {} bytes, dropping the embedded thumbnail",
            MAX_EXIF_PAYLOAD
        );
        let mut slim = segment.clone();
        slim.thumbnail = None;
        blob = serialize(&slim)?;
    }
    match blob {
        Some(b) if b.len() > MAX_EXIF_PAYLOAD => Err(PipelineError::encode(
            PathBuf::new(),
            format!(
                "Metadata of {} bytes exceeds the {} byte Exif segment limit",
                b.len(),
                MAX_EXIF_PAYLOAD
            ),
        )),
        other => Ok(other),
    }
}
