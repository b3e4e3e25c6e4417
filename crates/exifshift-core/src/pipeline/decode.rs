//! Container decoding: raw file bytes to a pixel buffer plus the raw
//! metadata blob.
//!
//! The container format is inferred from the file extension. Standard raster
//! files (JPEG, PNG) go through [`RasterDecoder`]; HEIF/HEIC files go through
//! [`HeifDecoder`](super::heif::HeifDecoder).

use image::{DynamicImage, ImageBuffer};
use img_parts::{jpeg::Jpeg, png::Png, Bytes, ImageEXIF};
use std::io::Cursor;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

/// Container format, from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Png,
    Heif,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "heic" | "heif" => Some(Self::Heif),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Heif => "heif",
        }
    }
}

/// Channel layout of a [`PixelBuffer`], 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Luma8,
    Rgb8,
    Rgba8,
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Luma8 => 1,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

/// Decoded pixels. Rows are `stride` bytes apart; trailing row padding is
/// allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub layout: PixelLayout,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Build a buffer, rejecting inconsistent layouts.
    pub fn new(
        layout: PixelLayout,
        width: u32,
        height: u32,
        stride: usize,
        data: Vec<u8>,
    ) -> PipelineResult<Self> {
        let buffer = Self {
            layout,
            width,
            height,
            stride,
            data,
        };
        buffer.check().map_err(PipelineError::container)?;
        Ok(buffer)
    }

    /// Tightly packed buffer taken from a decoded image. Alpha is kept when
    /// present, other layouts are converted to 8-bit RGB.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let (layout, width, height, data) = match image {
            DynamicImage::ImageLuma8(buf) => {
                (PixelLayout::Luma8, buf.width(), buf.height(), buf.into_raw())
            }
            DynamicImage::ImageRgba8(buf) => {
                (PixelLayout::Rgba8, buf.width(), buf.height(), buf.into_raw())
            }
            other if other.color().has_alpha() => {
                let buf = other.into_rgba8();
                (PixelLayout::Rgba8, buf.width(), buf.height(), buf.into_raw())
            }
            other => {
                let buf = other.into_rgb8();
                (PixelLayout::Rgb8, buf.width(), buf.height(), buf.into_raw())
            }
        };
        Self {
            layout,
            width,
            height,
            stride: width as usize * layout.bytes_per_pixel(),
            data,
        }
    }

    /// Consistency check: `stride >= width * bpp` and
    /// `data.len() >= stride * height`.
    pub fn check(&self) -> Result<(), String> {
        let row = self.width as usize * self.layout.bytes_per_pixel();
        if self.stride < row {
            return Err(format!(
                "stride {} shorter than row of {} bytes",
                self.stride, row
            ));
        }
        let needed = self.stride.saturating_mul(self.height as usize);
        if self.data.len() < needed {
            return Err(format!(
                "pixel data holds {} bytes, {}x{} needs {}",
                self.data.len(),
                self.width,
                self.height,
                needed
            ));
        }
        Ok(())
    }

    /// Pack rows and wrap as an `image` buffer.
    pub fn to_dynamic(&self) -> Result<DynamicImage, String> {
        self.check()?;
        let row = self.width as usize * self.layout.bytes_per_pixel();
        let packed: Vec<u8> = if self.stride == row {
            self.data[..row * self.height as usize].to_vec()
        } else {
            self.data
                .chunks(self.stride)
                .take(self.height as usize)
                .flat_map(|line| &line[..row])
                .copied()
                .collect()
        };

        let (w, h) = (self.width, self.height);
        let image = match self.layout {
            PixelLayout::Luma8 => ImageBuffer::from_raw(w, h, packed).map(DynamicImage::ImageLuma8),
            PixelLayout::Rgb8 => ImageBuffer::from_raw(w, h, packed).map(DynamicImage::ImageRgb8),
            PixelLayout::Rgba8 => ImageBuffer::from_raw(w, h, packed).map(DynamicImage::ImageRgba8),
        };
        image.ok_or_else(|| format!("pixel data does not fit {w}x{h}"))
    }
}

/// Result of decoding a container.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub pixels: PixelBuffer,
    /// Raw metadata blob as stored in the container, if any
    pub metadata: Option<Vec<u8>>,
}

/// A container format decoder.
pub trait ContainerDecoder: Send + Sync {
    /// Decode pixels and extract the metadata blob.
    fn decode(&self, bytes: &[u8]) -> PipelineResult<DecodedImage>;

    /// Extract the metadata blob without decoding pixels.
    fn read_metadata(&self, bytes: &[u8]) -> PipelineResult<Option<Vec<u8>>>;
}

/// Decoder for JPEG and PNG files.
pub struct RasterDecoder;

impl ContainerDecoder for RasterDecoder {
    fn decode(&self, bytes: &[u8]) -> PipelineResult<DecodedImage> {
        let metadata = self.read_metadata(bytes)?;
        let image = decode_raster(bytes)?;
        Ok(DecodedImage {
            pixels: PixelBuffer::from_dynamic(image),
            metadata,
        })
    }

    fn read_metadata(&self, bytes: &[u8]) -> PipelineResult<Option<Vec<u8>>> {
        let exif = if bytes.starts_with(&[0xFF, 0xD8]) {
            Jpeg::from_bytes(Bytes::copy_from_slice(bytes))
                .map_err(|e| PipelineError::container(format!("Malformed JPEG: {e}")))?
                .exif()
        } else if bytes.starts_with(b"\x89PNG") {
            Png::from_bytes(Bytes::copy_from_slice(bytes))
                .map_err(|e| PipelineError::container(format!("Malformed PNG: {e}")))?
                .exif()
        } else {
            return Err(PipelineError::container(
                "Unrecognized raster format (invalid magic bytes)",
            ));
        };
        Ok(exif.map(|b| b.to_vec()))
    }
}

/// Decode a JPEG or PNG byte stream with the `image` crate.
pub(crate) fn decode_raster(bytes: &[u8]) -> PipelineResult<DynamicImage> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::container(format!("Cannot detect image format: {e}")))?;
    reader
        .decode()
        .map_err(|e| PipelineError::container(e.to_string()))
}
