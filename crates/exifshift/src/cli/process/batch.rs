//! Batch processing: bounded-concurrency runs with progress and streaming
//! report output.

use std::fs::File;
use std::io::{BufWriter, Write};

use exifshift_core::pipeline::{output_name, unique_output_names, DiscoveredFile};
use exifshift_core::{FileReport, FileStatus, OutputWriter, ProcessingStats};
use futures_util::stream::{self, StreamExt};

use super::{ProcessArgs, ProcessContext};

/// Process discovered files, `ctx.parallel` at a time. Per-file failures
/// are reported, never propagated.
pub async fn process_batch(
    ctx: ProcessContext,
    args: &ProcessArgs,
    files: Vec<DiscoveredFile>,
) -> anyhow::Result<()> {
    let sink: Box<dyn Write> = match &args.report {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = OutputWriter::new(sink, ctx.output_format, ctx.config.output.pretty);
    let streaming = ctx.output_format.is_streaming();

    let progress = if files.len() > 1 {
        create_progress_bar(files.len() as u64)
    } else {
        indicatif::ProgressBar::hidden()
    };

    let mut stats = ProcessingStats::default();
    let mut collected: Vec<FileReport> = Vec::new();
    let start_time = std::time::Instant::now();

    let names = unique_output_names(files.iter().map(|f| f.path.as_path()));
    for (file, name) in files.iter().zip(&names) {
        if output_name(&file.path) != *name {
            tracing::info!("{:?} shares its base name, writing it as {}", file.path, name);
        }
    }

    let processor = &ctx.processor;
    let options = &ctx.options;
    let out_dir = ctx.out_dir.as_path();
    let mut reports = stream::iter(files.into_iter().zip(names))
        .map(|(file, name)| async move {
            processor
                .process_as(&file.path, out_dir, &name, options)
                .await
        })
        .buffer_unordered(ctx.parallel.max(1));

    while let Some(report) = reports.next().await {
        stats.record(&report.status);
        log_outcome(&report);

        if streaming {
            progress.suspend(|| writer.write(&report))?;
        } else {
            collected.push(report);
        }

        progress.inc(1);
        let elapsed = start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            progress.set_message(format!("{:.1} img/sec", stats.total() as f64 / elapsed));
        }
    }

    if !streaming {
        collected.sort_by(|a, b| a.input.cmp(&b.input));
        writer.write_all(&collected)?;
    }
    writer.flush()?;
    if let Some(path) = &args.report {
        tracing::info!("Report written to {:?}", path);
    }

    stats.finish(start_time.elapsed());
    progress.finish_and_clear();
    print_summary(&stats);

    Ok(())
}

fn log_outcome(report: &FileReport) {
    match &report.status {
        FileStatus::Written {
            output,
            metadata_degraded,
            ..
        } => {
            if *metadata_degraded {
                tracing::warn!("Wrote {:?} without source metadata", output);
            } else {
                tracing::debug!("Wrote {:?}", output);
            }
        }
        FileStatus::Rejected { .. } => {}
        FileStatus::Failed { kind, message } => {
            tracing::error!("Failed: {:?} - {} ({})", report.input, message, kind);
        }
    }
}

/// Create a progress bar for batch processing.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    let pb = ProgressBar::new(total);
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary table after batch processing.
fn print_summary(stats: &ProcessingStats) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Written:      {:>8}", stats.written);
    if stats.rejected > 0 {
        eprintln!("    Rejected:     {:>8}", stats.rejected);
    }
    if stats.failed > 0 {
        eprintln!("    Failed:       {:>8}", stats.failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", stats.total());
    eprintln!("    Duration:     {:>7.1}s", stats.total_seconds);
    eprintln!("    Rate:         {:>7.1} img/sec", stats.files_per_second);
    eprintln!("  ====================================");
}
