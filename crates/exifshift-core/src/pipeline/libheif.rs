//! Whole-file HEIF decoding through the system `libheif`.
//!
//! Used for primary items the pure-Rust item decoders do not cover: HEVC
//! (`hvc1`), AV1 (`av01`) and tiled `grid` images. libheif applies the
//! container's rotation and mirror properties while decoding.

use libheif_rs::{ColorSpace, HeifContext, ItemId, LibHeif, RgbChroma};

use super::decode::{PixelBuffer, PixelLayout};
use crate::error::{PipelineError, PipelineResult};

fn heif_error(err: libheif_rs::HeifError) -> PipelineError {
    PipelineError::container(format!("libheif: {err}"))
}

/// Decode the primary image to interleaved 8-bit RGB.
pub(crate) fn decode_primary(bytes: &[u8]) -> PipelineResult<PixelBuffer> {
    let lib = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(bytes).map_err(heif_error)?;
    let handle = ctx.primary_image_handle().map_err(heif_error)?;
    let image = lib
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(heif_error)?;

    let planes = image.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| PipelineError::container("libheif returned no interleaved plane"))?;
    tracing::trace!(
        "libheif decoded {}x{} ({} bits per pixel)",
        plane.width,
        plane.height,
        plane.bits_per_pixel
    );
    PixelBuffer::new(
        PixelLayout::Rgb8,
        plane.width,
        plane.height,
        plane.stride,
        plane.data.to_vec(),
    )
}

/// The Exif block attached to the primary image, as libheif reports it.
pub(crate) fn exif_blob(bytes: &[u8]) -> PipelineResult<Option<Vec<u8>>> {
    let ctx = HeifContext::read_from_bytes(bytes).map_err(heif_error)?;
    let handle = ctx.primary_image_handle().map_err(heif_error)?;

    let mut ids: Vec<ItemId> = vec![0; 1];
    if handle.metadata_block_ids(&mut ids, b"Exif") == 0 {
        return Ok(None);
    }
    handle.metadata(ids[0]).map(Some).map_err(heif_error)
}
