//! The `exifshift inspect` command: metadata reports without writing files.

use clap::Args;
use exifshift_core::pipeline::InspectReport;
use exifshift_core::{Config, FileProcessor};
use std::path::PathBuf;

/// Arguments for the `inspect` command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Image file or directory to inspect
    #[arg(required = true)]
    pub input: PathBuf,

    /// Look up the address of each photo's GPS position
    #[arg(long)]
    pub geocode: bool,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,
}

/// Execute the inspect command.
pub async fn execute(args: InspectArgs, mut config: Config) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input path does not exist: {:?}", args.input);
    }
    if args.recursive {
        config.processing.recursive = true;
    }

    let geocode = if args.geocode {
        Some(super::nominatim(&config.geocode)?)
    } else {
        None
    };

    let reports = collect_reports(&FileProcessor::new(&config), &args, geocode.as_ref()).await;
    if reports.is_empty() {
        tracing::warn!("No supported image files found at {:?}", args.input);
        return Ok(());
    }

    let json = if args.input.is_file() {
        serde_json::to_string_pretty(&reports[0])?
    } else {
        serde_json::to_string_pretty(&reports)?
    };
    println!("{json}");
    Ok(())
}

async fn collect_reports(
    processor: &FileProcessor,
    args: &InspectArgs,
    geocode: Option<&exifshift_core::GeocodeOptions>,
) -> Vec<InspectReport> {
    let mut reports = Vec::new();
    // Sequential: geocoded lookups are throttled anyway.
    for file in processor.discover(&args.input) {
        reports.push(processor.inspect(&file.path, geocode).await);
    }
    reports
}
