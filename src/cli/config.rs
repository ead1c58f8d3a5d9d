//! CLI configuration module
//!
//! Manages the persisted JSON configuration and its command-line overrides.

use crate::cli::args::CliArgs;
use crate::error::{DownloaderError, Result as DownloaderResult};
use crate::manifest::FileKind;
use crate::storage::scheduler::DEFAULT_CONCURRENCY;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration for the downloader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Download directory
    pub output_dir: PathBuf,
    /// File kinds picked by the "default types" selection
    pub default_file_types: Vec<String>,
    /// Select high-quality audio without prompting
    pub hq_audio_only: bool,
    /// Maximum number of simultaneous file transfers
    pub concurrency_limit: usize,
    /// Optional HTTP(S) proxy
    pub proxy: Option<String>,
    /// Hand finished audio to the tagger
    pub tag_audio: bool,
    /// Size-aware integrity check
    pub verify_size: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            default_file_types: FileKind::DOWNLOADABLE.iter().map(|k| k.as_str().to_string()).collect(),
            hq_audio_only: false,
            concurrency_limit: DEFAULT_CONCURRENCY,
            proxy: None,
            tag_audio: false,
            verify_size: false,
        }
    }
}

impl Config {
    /// Load the configuration file, falling back to defaults when it is missing
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No configuration file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let config: Config = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Persist the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)
            .with_context(|| format!("Failed to write configuration file {}", path.display()))?;
        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Command-line flags win over file values
    pub fn apply_args(&mut self, args: &CliArgs) {
        if let Some(dir) = &args.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(concurrency) = args.concurrency {
            self.concurrency_limit = concurrency;
        }
        if let Some(proxy) = &args.proxy {
            self.proxy = Some(proxy.clone());
        }
        if args.verify_size {
            self.verify_size = true;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> DownloaderResult<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(DownloaderError::config_error_with_field("output_dir cannot be empty", "output_dir"));
        }

        if self.concurrency_limit == 0 {
            return Err(DownloaderError::config_error_with_field(
                "concurrency_limit must be at least 1",
                "concurrency_limit",
            ));
        }

        self.default_kinds()?;

        if let Some(proxy) = self.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            url::Url::parse(proxy.trim()).map_err(|e| {
                DownloaderError::config_error_with_field(format!("Invalid proxy '{}': {}", proxy, e), "proxy")
            })?;
        }

        Ok(())
    }

    /// `default_file_types` as kinds, in config order without repeats.
    /// `folder` and unknown names are rejected.
    pub fn default_kinds(&self) -> DownloaderResult<Vec<FileKind>> {
        let mut kinds = Vec::new();
        for name in &self.default_file_types {
            let kind: FileKind = name.parse().map_err(|_| {
                DownloaderError::config_error_with_field(format!("Unknown file type '{}'", name), "default_file_types")
            })?;
            if !kind.is_downloadable() {
                return Err(DownloaderError::config_error_with_field(
                    format!("'{}' is not a downloadable file type", name),
                    "default_file_types",
                ));
            }
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("downloader_config_{}.json", name))
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_file_types, vec!["audio", "image", "text"]);
        assert_eq!(config.concurrency_limit, 3);
        assert!(!config.hq_audio_only);
        assert!(!config.tag_audio);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = temp_file("missing");
        let _ = std::fs::remove_file(&path);
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_file("partial");
        std::fs::write(&path, r#"{"output_dir": "/data/asmr", "hq_audio_only": true}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/data/asmr"));
        assert!(config.hq_audio_only);
        assert_eq!(config.concurrency_limit, 3);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let path = temp_file("malformed");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(Config::load(&path).is_err());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_file("roundtrip");
        let config = Config {
            output_dir: PathBuf::from("/tmp/out"),
            proxy: Some("http://127.0.0.1:7890".to_string()),
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_apply_args() {
        let args = CliArgs::try_parse_from([
            "rust-asmr-downloader",
            "-o",
            "/tmp/elsewhere",
            "-c",
            "6",
            "--proxy",
            "http://proxy:8080",
            "--verify-size",
        ])
        .unwrap();
        let mut config = Config::default();
        config.apply_args(&args);

        assert_eq!(config.output_dir, PathBuf::from("/tmp/elsewhere"));
        assert_eq!(config.concurrency_limit, 6);
        assert_eq!(config.proxy(), Some("http://proxy:8080"));
        assert!(config.verify_size);
    }

    #[test]
    fn test_validate_rejects() {
        let config = Config {
            concurrency_limit: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            default_file_types: vec!["audio".into(), "folder".into()],
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            default_file_types: vec!["video".into()],
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            proxy: Some("::not a url".into()),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            output_dir: PathBuf::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_kinds_keep_config_order() {
        let config = Config {
            default_file_types: vec!["text".into(), "audio".into(), "text".into(), "image".into()],
            ..Config::default()
        };
        assert_eq!(
            config.default_kinds().unwrap(),
            vec![FileKind::Text, FileKind::Audio, FileKind::Image]
        );
    }
}
