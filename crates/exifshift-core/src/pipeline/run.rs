//! Single-image pipeline: decode, parse, filter, mutate, encode.
//!
//! ```text
//! Decoding → Parsing → Filtering → [Correcting] → Mutating → Encoding → Done
//!                          └→ Rejected
//! ```
//!
//! Any stage can end the run as `Failed`, except parsing: a malformed
//! metadata segment degrades to an empty one and the run continues.

use exif::{In, Reader, Tag};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::time::Instant;

use super::decode::{ContainerDecoder, PixelBuffer, RasterDecoder, SourceFormat};
use super::encode::JpegWriter;
use super::gps::GeoCoordinate;
use super::heif::{FourCc, HeifDecoder, ItemDecoder};
use super::mutate::{self, MutationRequest, OrientationPolicy};
use super::orient::{self, Orientation};
use super::policy::{self, PolicyVerdict, RejectReason};
use crate::error::{ErrorKind, PipelineError, PipelineResult};
use crate::metadata::{self, MetadataSegment};

/// Pipeline stage, for logging and failure context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decoding,
    Parsing,
    Filtering,
    Correcting,
    Mutating,
    Encoding,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Decoding => "decode",
            Stage::Parsing => "parse",
            Stage::Filtering => "filter",
            Stage::Correcting => "orient",
            Stage::Mutating => "mutate",
            Stage::Encoding => "encode",
        })
    }
}

/// A successfully rewritten image.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// `<input base name>.jpg`
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Coordinate read from the input's GPS group
    pub location: Option<GeoCoordinate>,
    /// The input's metadata was malformed and dropped
    pub metadata_degraded: bool,
}

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Success(PipelineOutput),
    Rejected(RejectReason),
    Failed { kind: ErrorKind, message: String },
}

impl PipelineOutcome {
    fn failed(err: PipelineError) -> Self {
        PipelineOutcome::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Reusable pipeline: the HEIF item-decoder registry and encoder settings.
#[derive(Clone, Default)]
pub struct Pipeline {
    heif: HeifDecoder,
    writer: JpegWriter,
}

impl Pipeline {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            heif: HeifDecoder::new(),
            writer: JpegWriter::new(jpeg_quality),
        }
    }

    /// Register a decoder for HEIF items of `item_type`.
    pub fn with_item_decoder(
        mut self,
        item_type: FourCc,
        decoder: std::sync::Arc<dyn ItemDecoder>,
    ) -> Self {
        self.heif = self.heif.with_decoder(item_type, decoder);
        self
    }

    /// Decoder for the container named by `hint`'s extension.
    pub fn decoder(&self, hint: &Path) -> PipelineResult<&dyn ContainerDecoder> {
        match SourceFormat::from_path(hint) {
            Some(SourceFormat::Heif) => Ok(&self.heif),
            Some(SourceFormat::Jpeg | SourceFormat::Png) => Ok(&RasterDecoder),
            None => Err(PipelineError::UnsupportedFormat {
                path: hint.to_path_buf(),
                format: hint
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
            }),
        }
    }

    /// Run one image through every stage.
    pub fn run(&self, bytes: &[u8], hint: &Path, request: &MutationRequest) -> PipelineOutcome {
        match self.run_stages(bytes, hint, request) {
            Ok(outcome) => outcome,
            Err((stage, err)) => {
                let err = err.with_path(hint);
                tracing::debug!("{:?} failed in {} stage: {}", hint, stage, err);
                PipelineOutcome::failed(err)
            }
        }
    }

    fn run_stages(
        &self,
        bytes: &[u8],
        hint: &Path,
        request: &MutationRequest,
    ) -> Result<PipelineOutcome, (Stage, PipelineError)> {
        let start = Instant::now();
        tracing::debug!("Running pipeline: {:?}", hint);
        let at = |stage: Stage| move |e: PipelineError| (stage, e);

        // Decode
        let stage_start = Instant::now();
        let decoded = self
            .decoder(hint)
            .and_then(|d| d.decode(bytes))
            .map_err(at(Stage::Decoding))?;
        let mut pixels = decoded.pixels;
        tracing::trace!("  Decode: {:?}", stage_start.elapsed());

        // Parse
        let stage_start = Instant::now();
        let (mut segment, metadata_degraded) = match metadata::parse(decoded.metadata.as_deref()) {
            Ok(segment) => (segment, false),
            Err(e) => {
                tracing::warn!("Dropping malformed metadata in {:?}: {}", hint, e);
                (MetadataSegment::empty(), true)
            }
        };
        let location = match GeoCoordinate::from_segment(&segment) {
            Ok(location) => location,
            Err(e) => {
                tracing::warn!("Ignoring GPS data in {:?}: {}", hint, e);
                None
            }
        };
        tracing::trace!("  Parse: {:?}", stage_start.elapsed());

        // Filter
        if let PolicyVerdict::Reject(reason) = policy::evaluate(&segment) {
            tracing::debug!("Rejected {:?}: {}", hint, reason);
            return Ok(PipelineOutcome::Rejected(reason));
        }

        // Correct orientation (explicit policy only)
        if request.orientation == OrientationPolicy::Correct {
            let stage_start = Instant::now();
            if let Some(upright) =
                orient::correct(&pixels, Orientation::of(&segment)).map_err(at(Stage::Correcting))?
            {
                pixels = upright;
            }
            tracing::trace!("  Orient: {:?}", stage_start.elapsed());
        }

        // Mutate
        mutate::apply(&mut segment, request).map_err(at(Stage::Mutating))?;

        // Encode
        let stage_start = Instant::now();
        let bytes = self
            .writer
            .encode(&pixels, Some(&segment))
            .map_err(at(Stage::Encoding))?;
        tracing::trace!("  Encode: {:?}", stage_start.elapsed());
        verify_output(&bytes);

        let PixelBuffer { width, height, .. } = pixels;
        tracing::debug!(
            "Rewrote {:?} in {:?} ({}x{})",
            hint,
            start.elapsed(),
            width,
            height
        );

        Ok(PipelineOutcome::Success(PipelineOutput {
            file_name: output_name(hint),
            bytes,
            width,
            height,
            location,
            metadata_degraded,
        }))
    }
}

/// Run one image with default settings.
pub fn run_pipeline(bytes: &[u8], hint: &Path, request: &MutationRequest) -> PipelineOutcome {
    Pipeline::default().run(bytes, hint, request)
}

/// Output file name: the input's base name with a `.jpg` extension.
pub fn output_name(hint: &Path) -> String {
    let stem = hint
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output".to_string());
    format!("{stem}.jpg")
}

/// Output file names for a batch, in input order. Inputs whose base names
/// collide (compared case-insensitively) keep the first `<stem>.jpg` for
/// the earliest input; later ones get `<stem>-<n>.jpg`, skipping names
/// another input would produce on its own.
pub fn unique_output_names<'a>(inputs: impl IntoIterator<Item = &'a Path>) -> Vec<String> {
    let names: Vec<String> = inputs.into_iter().map(output_name).collect();
    let natural: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());

    names
        .into_iter()
        .map(|name| {
            if taken.insert(name.to_lowercase()) {
                return name;
            }
            let stem = name.strip_suffix(".jpg").unwrap_or(&name).to_string();
            let mut n = 1usize;
            loop {
                let candidate = format!("{stem}-{n}.jpg");
                let key = candidate.to_lowercase();
                if !natural.contains(&key) && taken.insert(key) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

/// Read the encoded output back and log what it reports.
fn verify_output(jpeg: &[u8]) {
    match Reader::new().read_from_container(&mut Cursor::new(jpeg)) {
        Ok(exif) => {
            let show = |tag: Tag| {
                exif.get_field(tag, In::PRIMARY)
                    .map(|f| f.display_value().to_string())
                    .unwrap_or_else(|| "-".to_string())
            };
            tracing::debug!(
                "Output reports model={} datetime={}",
                show(Tag::Model),
                show(Tag::DateTime)
            );
        }
        Err(e) => tracing::debug!("Output carries no readable metadata: {}", e),
    }
}
