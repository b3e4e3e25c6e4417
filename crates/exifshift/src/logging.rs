//! Logging initialization.
//!
//! Logs go to stderr through `tracing-subscriber`; stdout carries reports.
//! `RUST_LOG` overrides the configured level.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global subscriber with a default filter directive.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize logging from the `[logging]` section, with CLI overrides.
pub fn init_from_config(config: &exifshift_core::Config, verbose: bool, json_logs: bool) {
    let json_format = json_logs || config.logging.format.eq_ignore_ascii_case("json");
    init(&level_directive(&config.logging.level, verbose), json_format);
}

/// `--verbose` raises the level to at least debug; unknown levels fall back
/// to info.
fn level_directive(configured: &str, verbose: bool) -> String {
    let level = match configured.to_ascii_lowercase().as_str() {
        l @ ("error" | "warn" | "info" | "debug" | "trace") => l.to_string(),
        _ => "info".to_string(),
    };
    if verbose && level != "trace" {
        "debug".to_string()
    } else {
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("warn", false), "warn");
        assert_eq!(level_directive("WARN", true), "debug");
        assert_eq!(level_directive("trace", true), "trace");
        assert_eq!(level_directive("loud", false), "info");
    }
}
