//! rust-asmr-downloader
//!
//! A concurrent, resumable bulk downloader for asmr.one works.

pub mod manifest;
pub mod selection;
pub mod storage;
pub mod catalog;
pub mod work;
pub mod cli;
pub mod error;

pub use error::{CatalogErrorKind, DownloaderError};

pub use manifest::{FileKind, FileTask, ManifestFlattener, ManifestNode, TaskStatus};
pub use selection::{SelectionFilter, SelectionMode};
pub use storage::{
    BatchReport, BatchSummary, DownloadScheduler, IntegrityCheck, PauseController, PauseFlag, ProgressSink,
    RetryPolicy, SchedulerSettings, TransferSettings, TransferUnit,
};
pub use catalog::{Catalog, CatalogClient, WorkMetadata};
pub use work::{RunSummary, WorkOutcome, WorkPipeline, WorkSettings};
pub use cli::{CliArgs, Config, ConsoleInput};
