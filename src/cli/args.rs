//! CLI arguments module
//!
//! Defines command-line argument parsing using clap.

use clap::Parser;
use std::path::PathBuf;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default log file, relative to the working directory
pub const DEFAULT_LOG_FILE: &str = "download_log.txt";

/// CLI arguments for the downloader
#[derive(Debug, Parser)]
#[command(name = "rust-asmr-downloader")]
#[command(about = "Concurrent, resumable bulk downloader for asmr.one works", long_about = None)]
pub struct CliArgs {
    /// Work ids to download (e.g. RJ387142 or 387142)
    #[arg(value_name = "RJ_ID")]
    pub rj_ids: Vec<String>,

    /// Search the catalog and download up to LIMIT matching works
    #[arg(long, num_args = 2, value_names = ["QUERY", "LIMIT"])]
    pub search: Option<Vec<String>>,

    /// Download directory
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of simultaneous file transfers
    #[arg(short, long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// HTTP(S) proxy for all requests
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Non-interactive selection: all, default, audio, image, text, hq, or indices like 1,3-5
    #[arg(short, long, value_name = "MODE")]
    pub select: Option<String>,

    /// Treat a file as complete only when its size matches the manifest
    #[arg(long)]
    pub verify_size: bool,

    /// Configuration file
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub show_config: bool,

    /// Save the effective configuration to the configuration file
    #[arg(long)]
    pub save_config: bool,

    /// Print the completed-works history and exit
    #[arg(long)]
    pub history: bool,

    /// Log file
    #[arg(long, value_name = "FILE", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (no output except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Get the log level based on verbosity settings
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::INFO
        }
    }

    /// Search query and limit, when `--search` was given
    pub fn search_request(&self) -> Option<(String, usize)> {
        let values = self.search.as_ref()?;
        let query = values.first()?.clone();
        let limit = values.get(1)?.trim().parse().ok()?;
        Some((query, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let args = CliArgs::try_parse_from(["rust-asmr-downloader", "RJ1"]).unwrap();

        assert_eq!(args.rj_ids, vec!["RJ1".to_string()]);
        assert_eq!(args.config_file, PathBuf::from("config.json"));
        assert_eq!(args.log_file, PathBuf::from("download_log.txt"));
        assert!(args.search.is_none());
        assert!(!args.verify_size);
        assert_eq!(args.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_search_and_overrides() {
        let args = CliArgs::try_parse_from([
            "rust-asmr-downloader",
            "--search",
            "rain sounds",
            "5",
            "-c",
            "4",
            "--select",
            "1,3-5",
            "-v",
        ])
        .unwrap();

        assert!(args.rj_ids.is_empty());
        assert_eq!(args.search_request(), Some(("rain sounds".to_string(), 5)));
        assert_eq!(args.concurrency, Some(4));
        assert_eq!(args.select.as_deref(), Some("1,3-5"));
        assert_eq!(args.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_bad_search_limit() {
        let args = CliArgs::try_parse_from(["rust-asmr-downloader", "--search", "q", "many"]).unwrap();
        assert!(args.search_request().is_none());
    }
}
