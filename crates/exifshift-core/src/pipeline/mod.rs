//! Image processing pipeline components.
//!
//! This module contains all the stages of the metadata pipeline:
//! - **decode**: Container decoding for JPEG and PNG
//! - **heif**: HEIF/HEIC box parsing and item decoding; HEVC, AV1 and grid
//!   images go through libheif with the `heif` feature
//! - **gps**: DMS to decimal coordinate conversion
//! - **policy**: Content policy filter
//! - **mutate**: Device, date and orientation edits
//! - **orient**: Pixel orientation correction
//! - **encode**: JPEG encoding with embedded Exif
//! - **run**: The single-image state machine
//! - **inspect**: Metadata-only reports
//! - **discovery**: Find image files in directories
//! - **validate**: Pre-processing validation
//! - **processor**: File-level orchestration

pub mod decode;
pub mod discovery;
pub mod encode;
pub mod gps;
pub mod heif;
pub mod inspect;
#[cfg(feature = "heif")]
mod libheif;
pub mod mutate;
pub mod orient;
pub mod policy;
pub mod processor;
pub mod run;
pub mod validate;

// Re-exports for convenient access
pub use decode::{ContainerDecoder, DecodedImage, PixelBuffer, PixelLayout, SourceFormat};
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use encode::JpegWriter;
pub use gps::{to_decimal, GeoCoordinate};
pub use heif::{FourCc, HeifDecoder, ItemDecoder};
pub use inspect::InspectReport;
pub use mutate::{MutationRequest, OrientationPolicy};
pub use orient::Orientation;
pub use policy::{PolicyVerdict, RejectReason};
pub use processor::{FileProcessor, GeocodeOptions, ProcessOptions};
pub use run::{
    output_name, run_pipeline, unique_output_names, Pipeline, PipelineOutcome, PipelineOutput,
    Stage,
};
pub use validate::Validator;
