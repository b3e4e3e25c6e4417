//! Configuration management for ExifShift.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. All config structs implement `Default`.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for ExifShift.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Processing settings
    pub processing: ProcessingConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Reverse geocoding settings
    pub geocode: GeocodeConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.exifshift.exifshift/config.toml
    /// - Linux: ~/.config/exifshift/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\exifshift\exifshift\config\config.toml
    ///
    /// Falls back to ~/.exifshift/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "exifshift", "exifshift")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".exifshift").join("config.toml")
            })
    }

    /// Output directory for an input file or directory.
    ///
    /// `output.dir` wins when set (with `~` expansion); otherwise the output
    /// lands next to the input directory as `<dir name><dir_suffix>`.
    pub fn output_dir_for(&self, input: &Path) -> PathBuf {
        if let Some(dir) = &self.output.dir {
            let path_str = dir.to_string_lossy();
            return PathBuf::from(shellexpand::tilde(&path_str).into_owned());
        }

        let dir = if input.is_dir() {
            input
        } else {
            input.parent().unwrap_or_else(|| Path::new("."))
        };
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "images".to_string());
        dir.with_file_name(format!("{name}{}", self.output.dir_suffix))
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.processing.parallel_workers, 4);
        assert!(!config.processing.recursive);
        assert_eq!(config.limits.max_file_size_mb, 100);
        assert_eq!(config.output.jpeg_quality, 95);
        assert_eq!(config.geocode.min_interval_ms, 1000);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[processing]"));
        assert!(toml.contains("[geocode]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[output]\njpeg_quality = 80\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.output.jpeg_quality, 80);
        assert_eq!(config.output.dir_suffix, "_output");
        assert_eq!(config.geocode.language, "en");
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[processing]\nparallel_workers = 0\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));

        std::fs::write(&path, "not = [valid").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_output_dir_uses_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let photos = dir.path().join("photos");
        std::fs::create_dir(&photos).unwrap();

        let config = Config::default();
        assert_eq!(config.output_dir_for(&photos), dir.path().join("photos_output"));
        assert_eq!(
            config.output_dir_for(&photos.join("IMG_1.heic")),
            dir.path().join("photos_output")
        );
    }

    #[test]
    fn test_output_dir_override() {
        let mut config = Config::default();
        config.output.dir = Some(PathBuf::from("/srv/out"));
        assert_eq!(
            config.output_dir_for(Path::new("/anything")),
            PathBuf::from("/srv/out")
        );
    }
}
