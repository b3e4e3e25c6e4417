//! File-level orchestration: validate, run the pipeline off the async
//! runtime, write the output, and optionally geocode it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{Config, GeocodeConfig, ProcessingConfig};
use crate::error::PipelineError;
use crate::geocode::{reverse_with_retry, Address, ReverseGeocoder, RetryPolicy};
use crate::types::{FileReport, FileStatus};

use super::discovery::{DiscoveredFile, FileDiscovery};
use super::gps::GeoCoordinate;
use super::inspect::{self, InspectReport};
use super::mutate::MutationRequest;
use super::run::{output_name, Pipeline, PipelineOutcome};
use super::validate::Validator;

/// A geocoder plus the settings for calling it.
#[derive(Clone)]
pub struct GeocodeOptions {
    pub geocoder: Arc<dyn ReverseGeocoder>,
    pub language: String,
    pub retry: RetryPolicy,
}

impl GeocodeOptions {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>, config: &GeocodeConfig) -> Self {
        Self {
            geocoder,
            language: config.language.clone(),
            retry: RetryPolicy::from(config),
        }
    }

    /// Look up an address. Failures are logged and read as "no address".
    pub async fn lookup(&self, location: &GeoCoordinate) -> Option<Address> {
        match reverse_with_retry(
            self.geocoder.as_ref(),
            location.latitude,
            location.longitude,
            &self.language,
            self.retry,
        )
        .await
        {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!(
                    "{} lookup for ({}, {}) failed: {}",
                    self.geocoder.name(),
                    location.latitude,
                    location.longitude,
                    e
                );
                None
            }
        }
    }
}

/// Options for controlling file processing behavior.
#[derive(Clone, Default)]
pub struct ProcessOptions {
    pub request: MutationRequest,
    /// Remove the source file when the policy rejects it
    pub delete_rejected: bool,
    /// Geocode the location of written files
    pub geocode: Option<GeocodeOptions>,
}

/// Runs the pipeline over files on disk.
#[derive(Clone)]
pub struct FileProcessor {
    pipeline: Pipeline,
    validator: Validator,
    discovery_config: ProcessingConfig,
    decode_timeout: Duration,
}

impl FileProcessor {
    /// Create a new file processor with the given configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            pipeline: Pipeline::new(config.output.jpeg_quality),
            validator: Validator::new(config.limits.clone()),
            discovery_config: config.processing.clone(),
            decode_timeout: Duration::from_millis(config.limits.decode_timeout_ms),
        }
    }

    /// Replace the pipeline, e.g. one with extra HEIF item decoders.
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Discover all supported image files at a path.
    pub fn discover(&self, path: &Path) -> Vec<DiscoveredFile> {
        FileDiscovery::new(self.discovery_config.clone()).discover(path)
    }

    /// Process one file, writing `<out_dir>/<base name>.jpg` on success.
    ///
    /// Never fails: every error becomes a `Failed` status in the report.
    pub async fn process(&self, path: &Path, out_dir: &Path, options: &ProcessOptions) -> FileReport {
        self.process_as(path, out_dir, &output_name(path), options).await
    }

    /// Process one file, writing `<out_dir>/<file_name>` on success. Batch
    /// callers pass names from
    /// [`unique_output_names`](super::run::unique_output_names) so outputs never
    /// overwrite each other.
    pub async fn process_as(
        &self,
        path: &Path,
        out_dir: &Path,
        file_name: &str,
        options: &ProcessOptions,
    ) -> FileReport {
        let start = Instant::now();
        tracing::debug!("Processing: {:?}", path);

        let status = match self.try_process(path, out_dir.join(file_name), options).await {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!("Failed {:?}: {}", path, e);
                FileStatus::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        };

        FileReport {
            input: path.to_path_buf(),
            status,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn try_process(
        &self,
        path: &Path,
        target: PathBuf,
        options: &ProcessOptions,
    ) -> Result<FileStatus, PipelineError> {
        let bytes = self.read_validated(path).await?;

        let outcome = self
            .run_blocking(bytes, path.to_path_buf(), options.request.clone())
            .await?;

        match outcome {
            PipelineOutcome::Success(output) => {
                self.validator
                    .check_dimensions(path, output.width, output.height)?;

                if let Some(out_dir) = target.parent() {
                    tokio::fs::create_dir_all(out_dir)
                        .await
                        .map_err(|source| PipelineError::Io {
                            path: out_dir.to_path_buf(),
                            source,
                        })?;
                }
                tokio::fs::write(&target, &output.bytes)
                    .await
                    .map_err(|source| PipelineError::Io {
                        path: target.clone(),
                        source,
                    })?;
                tracing::debug!("Wrote {:?} ({} bytes)", target, output.bytes.len());

                let address = match (&options.geocode, &output.location) {
                    (Some(geocode), Some(location)) => geocode.lookup(location).await,
                    _ => None,
                };

                Ok(FileStatus::Written {
                    output: target,
                    width: output.width,
                    height: output.height,
                    location: output.location,
                    address,
                    metadata_degraded: output.metadata_degraded,
                })
            }
            PipelineOutcome::Rejected(reason) => {
                let source_deleted = options.delete_rejected && self.delete_source(path).await;
                tracing::info!("Rejected {:?}: {}", path, reason);
                Ok(FileStatus::Rejected {
                    reason,
                    source_deleted,
                })
            }
            PipelineOutcome::Failed { kind, message } => Ok(FileStatus::Failed { kind, message }),
        }
    }

    /// Build a metadata report for one file, geocoding its location when
    /// a geocoder is given.
    pub async fn inspect(&self, path: &Path, geocode: Option<&GeocodeOptions>) -> InspectReport {
        let bytes = match self.read_validated(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return InspectReport {
                    file: path.to_path_buf(),
                    note: Some(e.to_string()),
                    ..InspectReport::default()
                }
            }
        };

        let report = inspect::inspect(&self.pipeline, &bytes, path);
        let address = match (geocode, &report.location) {
            (Some(geocode), Some(location)) => geocode.lookup(location).await,
            _ => None,
        };
        report.with_address(address)
    }

    async fn read_validated(&self, path: &Path) -> Result<Vec<u8>, PipelineError> {
        self.validator.validate(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| PipelineError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        self.validator.check_header(path, &bytes)?;
        Ok(bytes)
    }

    /// Run the synchronous pipeline on the blocking pool under the decode
    /// timeout.
    async fn run_blocking(
        &self,
        bytes: Vec<u8>,
        path: PathBuf,
        request: MutationRequest,
    ) -> Result<PipelineOutcome, PipelineError> {
        let pipeline = self.pipeline.clone();
        let hint = path.clone();
        let task = tokio::task::spawn_blocking(move || pipeline.run(&bytes, &hint, &request));

        match tokio::time::timeout(self.decode_timeout, task).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(join_error)) => Err(PipelineError::Io {
                path,
                source: std::io::Error::other(format!("pipeline task failed: {join_error}")),
            }),
            Err(_) => Err(PipelineError::Timeout {
                path,
                stage: "pipeline".to_string(),
                timeout_ms: self.decode_timeout.as_millis() as u64,
            }),
        }
    }

    async fn delete_source(&self, path: &Path) -> bool {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!("Deleted rejected source {:?}", path);
                true
            }
            Err(e) => {
                tracing::warn!("Cannot delete rejected source {:?}: {}", path, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::geocode::Address;
    use crate::metadata::{self, TagValue};
    use crate::pipeline::RejectReason;
    use crate::testutil::{self, HeifBuilder};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use exif::{In, Reader, Tag};
    use std::io::Cursor;

    struct FixedGeocoder;

    #[async_trait]
    impl ReverseGeocoder for FixedGeocoder {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn reverse(
            &self,
            latitude: f64,
            _longitude: f64,
            _language: &str,
        ) -> Result<Option<Address>, PipelineError> {
            Ok(Some(Address {
                city: Some("Ho Chi Minh City".to_string()),
                full_address: format!("lat {latitude}"),
                ..Address::default()
            }))
        }
    }

    fn processor() -> FileProcessor {
        FileProcessor::new(&Config::default())
    }

    #[tokio::test]
    async fn test_process_heif_writes_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("IMG_0001.HEIC");
        let heif = HeifBuilder::new(testutil::jpeg_bytes(8, 6))
            .exif(&testutil::tiff_blob())
            .build();
        std::fs::write(&input, heif).unwrap();
        let out_dir = dir.path().join("out");

        let options = ProcessOptions {
            request: MutationRequest {
                device: Some("Pixel 8".to_string()),
                date: NaiveDate::from_ymd_opt(2024, 12, 25),
                ..MutationRequest::default()
            },
            ..ProcessOptions::default()
        };
        let report = processor().process(&input, &out_dir, &options).await;

        let FileStatus::Written { output, width, height, .. } = report.status else {
            panic!("expected written, got {:?}", report.status);
        };
        assert_eq!(output, out_dir.join("IMG_0001.jpg"));
        assert_eq!((width, height), (8, 6));

        let jpeg = std::fs::read(&output).unwrap();
        let exif = Reader::new()
            .read_from_container(&mut Cursor::new(jpeg))
            .unwrap();
        let model = exif.get_field(Tag::Model, In::PRIMARY).unwrap();
        assert!(model.display_value().to_string().contains("Pixel 8"));
        assert!(exif.get_field(Tag::Orientation, In::PRIMARY).is_none());
    }

    #[tokio::test]
    async fn test_rejected_source_deleted_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("edited.jpg");
        let mut seg = testutil::sample_segment();
        seg.set(Tag::ImageDescription, TagValue::ascii("filtered")).unwrap();
        let tiff = metadata::serialize(&seg).unwrap().unwrap();
        std::fs::write(&input, testutil::jpeg_with_exif(2, 2, &tiff)).unwrap();

        let options = ProcessOptions {
            delete_rejected: true,
            ..ProcessOptions::default()
        };
        let out_dir = dir.path().join("out");
        let report = processor().process(&input, &out_dir, &options).await;

        assert!(matches!(
            report.status,
            FileStatus::Rejected {
                reason: RejectReason::DescriptionPresent,
                source_deleted: true
            }
        ));
        assert!(!input.exists());
        assert!(!out_dir.join("edited.jpg").exists());
    }

    #[tokio::test]
    async fn test_rejected_source_kept_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("edited.jpg");
        let mut seg = testutil::sample_segment();
        seg.set(Tag::UserComment, TagValue::Undefined(b"ASCII\0\0\0Douyin".to_vec()))
            .unwrap();
        let tiff = metadata::serialize(&seg).unwrap().unwrap();
        std::fs::write(&input, testutil::jpeg_with_exif(2, 2, &tiff)).unwrap();

        let report = processor()
            .process(&input, dir.path(), &ProcessOptions::default())
            .await;
        assert!(matches!(
            report.status,
            FileStatus::Rejected {
                source_deleted: false,
                ..
            }
        ));
        assert!(input.exists());
    }

    #[tokio::test]
    async fn test_failures_are_reported_per_file() {
        let dir = tempfile::tempdir().unwrap();

        let report = processor()
            .process(&dir.path().join("missing.jpg"), dir.path(), &ProcessOptions::default())
            .await;
        assert!(matches!(
            report.status,
            FileStatus::Failed {
                kind: ErrorKind::IoError,
                ..
            }
        ));

        let garbage = dir.path().join("garbage.jpg");
        std::fs::write(&garbage, b"not a jpeg at all").unwrap();
        let report = processor()
            .process(&garbage, dir.path(), &ProcessOptions::default())
            .await;
        let FileStatus::Failed { kind, message } = report.status else {
            panic!("expected failure");
        };
        assert_eq!(kind, ErrorKind::FormatError);
        assert!(message.contains("garbage.jpg"));
    }

    #[tokio::test]
    async fn test_same_stem_inputs_get_distinct_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let heic = dir.path().join("IMG_1.HEIC");
        let jpg = dir.path().join("IMG_1.JPG");
        std::fs::write(&heic, HeifBuilder::new(testutil::jpeg_bytes(6, 4)).build()).unwrap();
        std::fs::write(&jpg, testutil::jpeg_bytes(3, 9)).unwrap();
        let out_dir = dir.path().join("out");

        let inputs = [heic, jpg];
        let names = crate::pipeline::unique_output_names(inputs.iter().map(PathBuf::as_path));
        let processor = processor();
        let mut outputs = Vec::new();
        for (input, name) in inputs.iter().zip(&names) {
            let report = processor
                .process_as(input, &out_dir, name, &ProcessOptions::default())
                .await;
            let FileStatus::Written { output, .. } = report.status else {
                panic!("expected written, got {:?}", report.status);
            };
            outputs.push(output);
        }

        assert_eq!(outputs, vec![out_dir.join("IMG_1.jpg"), out_dir.join("IMG_1-1.jpg")]);
        assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 2);
        let small = image::load_from_memory(&std::fs::read(&outputs[1]).unwrap()).unwrap();
        assert_eq!((small.width(), small.height()), (3, 9));
    }

    #[tokio::test]
    async fn test_image_dimension_limit() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("wide.jpg");
        std::fs::write(&input, testutil::jpeg_bytes(64, 8)).unwrap();

        let mut config = Config::default();
        config.limits.max_image_dimension = 32;
        let report = FileProcessor::new(&config)
            .process(&input, &dir.path().join("out"), &ProcessOptions::default())
            .await;
        assert!(matches!(
            report.status,
            FileStatus::Failed {
                kind: ErrorKind::FormatError,
                ..
            }
        ));
        assert!(!dir.path().join("out").join("wide.jpg").exists());
    }

    #[tokio::test]
    async fn test_written_file_is_geocoded() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("trip.jpg");
        let seg = testutil::with_gps(testutil::sample_segment(), [10, 30, 0], "N", [106, 0, 0], "E");
        let tiff = metadata::serialize(&seg).unwrap().unwrap();
        std::fs::write(&input, testutil::jpeg_with_exif(4, 4, &tiff)).unwrap();

        let options = ProcessOptions {
            geocode: Some(GeocodeOptions::new(
                Arc::new(FixedGeocoder),
                &GeocodeConfig::default(),
            )),
            ..ProcessOptions::default()
        };
        let report = processor()
            .process(&input, &dir.path().join("out"), &options)
            .await;

        let FileStatus::Written { address, location, .. } = report.status else {
            panic!("expected written");
        };
        assert_eq!(location.unwrap().latitude, 10.5);
        let address = address.unwrap();
        assert_eq!(address.city.as_deref(), Some("Ho Chi Minh City"));
        assert_eq!(address.full_address, "lat 10.5");
    }

    #[tokio::test]
    async fn test_inspect_with_geocoder() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("trip.jpg");
        let seg = testutil::with_gps(testutil::sample_segment(), [1, 0, 0], "S", [2, 0, 0], "W");
        let tiff = metadata::serialize(&seg).unwrap().unwrap();
        std::fs::write(&input, testutil::jpeg_with_exif(2, 2, &tiff)).unwrap();

        let geocode = GeocodeOptions::new(Arc::new(FixedGeocoder), &GeocodeConfig::default());
        let report = processor().inspect(&input, Some(&geocode)).await;
        assert_eq!(report.address.unwrap().full_address, "lat -1");

        let report = processor()
            .inspect(&dir.path().join("none.jpg"), None)
            .await;
        assert!(report.note.unwrap().contains("File not found"));
    }
}
