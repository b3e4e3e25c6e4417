//! Processor setup: config overrides, output location, geocoder creation.

use exifshift_core::{
    Config, FileProcessor, MutationRequest, OutputFormat as CoreOutputFormat, ProcessOptions,
};
use std::path::PathBuf;

use super::{ProcessArgs, ProcessContext};

/// Validate input, apply CLI overrides, and assemble everything needed for
/// processing.
pub fn setup_processor(args: &ProcessArgs, mut config: Config) -> anyhow::Result<ProcessContext> {
    if !args.input.exists() {
        anyhow::bail!(
            "Input path does not exist: {:?}\n\n  Hint: Check the file path and try again.",
            args.input
        );
    }

    apply_overrides(&mut config, args);
    config.validate()?;

    let request = MutationRequest {
        device: args.device.clone(),
        date: args.date,
        orientation: args.orientation.into(),
    };
    // Fail fast instead of once per file.
    request.validate()?;

    let geocode = if args.geocode {
        Some(crate::cli::nominatim(&config.geocode)?)
    } else {
        None
    };

    let options = ProcessOptions {
        request,
        delete_rejected: args.delete_rejected,
        geocode,
    };

    let output_format = match args.format {
        Some(format) => format.into(),
        None => CoreOutputFormat::parse(&config.output.format).unwrap_or_else(|| {
            tracing::warn!(
                "Unknown output format {:?} in config, using json",
                config.output.format
            );
            CoreOutputFormat::Json
        }),
    };

    let out_dir = resolve_out_dir(args, &config);
    if out_dir == args.input {
        anyhow::bail!(
            "Output directory {:?} is the input directory; outputs would overwrite sources",
            out_dir
        );
    }

    Ok(ProcessContext {
        processor: FileProcessor::new(&config),
        options,
        output_format,
        out_dir,
        parallel: config.processing.parallel_workers,
        config,
    })
}

fn apply_overrides(config: &mut Config, args: &ProcessArgs) {
    if let Some(parallel) = args.parallel {
        config.processing.parallel_workers = parallel;
    }
    if args.recursive {
        config.processing.recursive = true;
    }
    if let Some(quality) = args.quality {
        config.output.jpeg_quality = quality;
    }
}

/// `--output-dir` (with `~` expansion) wins over the configured location.
fn resolve_out_dir(args: &ProcessArgs, config: &Config) -> PathBuf {
    match &args.output_dir {
        Some(dir) => PathBuf::from(shellexpand::tilde(&dir.to_string_lossy()).into_owned()),
        None => config.output_dir_for(&args.input),
    }
}
