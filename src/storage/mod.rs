//! Storage module
//!
//! Resumable file transfers, the bounded batch scheduler, and the small
//! amount of state kept on disk between runs.

pub mod integrity;
pub mod pause;
pub mod retry;
pub mod progress;
pub mod transfer;
pub mod scheduler;
pub mod cache;
pub mod history;

#[cfg(test)]
pub(crate) mod test_server;

pub use integrity::IntegrityCheck;
pub use pause::{PauseCommand, PauseController, PauseFlag};
pub use retry::RetryPolicy;
pub use progress::{ChannelProgress, NullProgress, ProgressEvent, ProgressSink, TaskId};
pub use transfer::{TransferOutcome, TransferSettings, TransferUnit};
pub use scheduler::{BatchReport, BatchSummary, DownloadScheduler, SchedulerSettings};
pub use cache::ManifestCache;
pub use history::{HistoryEntry, WorkHistory};
