//! The `exifshift process` command.

mod batch;
mod setup;
pub mod types;

pub use types::{Orientation, OutputFormat};

use chrono::NaiveDate;
use clap::Args;
use exifshift_core::{Config, FileProcessor, OutputFormat as CoreOutputFormat, ProcessOptions};
use std::path::PathBuf;

use batch::process_batch;
use setup::setup_processor;
use types::parse_request_date;

/// Arguments for the `process` command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Image file or directory to process
    #[arg(required = true)]
    pub input: PathBuf,

    /// Directory for rewritten JPEGs (default: `<input dir><dir_suffix>`)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Write per-file reports to this file instead of stdout
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Report format (default: `[output] format`)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Replacement device model
    #[arg(long)]
    pub device: Option<String>,

    /// Replacement capture date; the time of day is kept
    #[arg(long, value_parser = parse_request_date)]
    pub date: Option<NaiveDate>,

    /// Orientation tag handling
    #[arg(long, value_enum, default_value = "strip")]
    pub orientation: Orientation,

    /// Delete source files that the content policy rejects
    #[arg(long)]
    pub delete_rejected: bool,

    /// Look up the address of each photo's GPS position
    #[arg(long)]
    pub geocode: bool,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Number of parallel workers (default: `[processing] parallel_workers`)
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// JPEG quality 1-100 (default: `[output] jpeg_quality`)
    #[arg(short, long)]
    pub quality: Option<u8>,
}

/// Processing context assembled by setup_processor().
pub(crate) struct ProcessContext {
    pub processor: FileProcessor,
    pub options: ProcessOptions,
    pub output_format: CoreOutputFormat,
    pub out_dir: PathBuf,
    pub parallel: usize,
    pub config: Config,
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs, config: Config) -> anyhow::Result<()> {
    let ctx = setup_processor(&args, config)?;

    let files = ctx.processor.discover(&args.input);
    if files.is_empty() {
        tracing::warn!("No supported image files found at {:?}", args.input);
        return Ok(());
    }
    tracing::info!(
        "Found {} image(s) to process, writing to {:?}",
        files.len(),
        ctx.out_dir
    );

    process_batch(ctx, &args, files).await
}
