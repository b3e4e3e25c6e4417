//! ExifShift CLI - rewrite device, capture date and orientation in photo
//! metadata, converting HEIC/HEIF photos to JPEG on the way.
//!
//! # Usage
//!
//! ```bash
//! # Rewrite a directory of photos into ./photos_output/
//! exifshift process ./photos --device "iPhone 15 Pro" --date 2024-12-25
//!
//! # Stream per-file reports as JSON Lines
//! exifshift process ./photos --format jsonl --report results.jsonl
//!
//! # Show what a photo's metadata says, with its address
//! exifshift inspect IMG_0001.HEIC --geocode
//!
//! # View configuration
//! exifshift config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// ExifShift - rewrite photo metadata and convert to JPEG.
#[derive(Parser, Debug)]
#[command(name = "exifshift")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Rewrite metadata and write JPEG copies
    Process(cli::process::ProcessArgs),

    /// Report device, capture date and location without writing anything
    Inspect(cli::inspect::InspectArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match exifshift_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `exifshift config path`."
            );
            exifshift_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("ExifShift v{}", exifshift_core::VERSION);

    match cli.command {
        Commands::Process(args) => cli::process::execute(args, config).await,
        Commands::Inspect(args) => cli::inspect::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
