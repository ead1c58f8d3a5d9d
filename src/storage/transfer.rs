//! Transfer module
//!
//! Resumable, retried download of a single file task.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures_util::StreamExt;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, trace, warn};

use crate::error::DownloaderError;
use crate::manifest::{FileTask, TaskStatus};
use crate::storage::pause::PauseFlag;
use crate::storage::progress::{ProgressSink, TaskId};
use crate::storage::retry::RetryPolicy;

/// Default write chunk size (8 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Default timeout for transfer requests
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);

/// Tunables for file transfers
#[derive(Debug, Clone, Copy)]
pub struct TransferSettings {
    /// Upper bound of a single file write
    pub chunk_size: usize,
    /// Bounds the wait for response headers and for each body chunk
    pub request_timeout: Duration,
    /// Attempts per file
    pub retry: RetryPolicy,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_timeout: TRANSFER_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of running one transfer unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    pub success: bool,
    /// Bytes written across all attempts, zero on failure
    pub bytes_written: u64,
}

impl TransferOutcome {
    pub fn megabytes(&self) -> f64 {
        self.bytes_written as f64 / 1024.0 / 1024.0
    }
}

/// Downloads file tasks, resuming partial files across attempts
#[derive(Clone)]
pub struct TransferUnit {
    client: Client,
    settings: TransferSettings,
    pause: PauseFlag,
    progress: Arc<dyn ProgressSink>,
}

impl TransferUnit {
    pub fn new(
        client: Client,
        settings: TransferSettings,
        pause: PauseFlag,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            client,
            settings,
            pause,
            progress,
        }
    }

    /// Download `task` to its target path
    ///
    /// Every attempt re-reads the partial file's length, so bytes already on
    /// disk are kept and resumed.
    pub async fn run(&self, task_id: TaskId, task: &mut FileTask) -> TransferOutcome {
        let policy = self.settings.retry;
        let mut written = 0u64;
        self.set_status(task_id, task, TaskStatus::Downloading);
        info!("Starting download: {}", task.display_name);

        let mut attempt = 1;
        loop {
            match self.attempt(task_id, task, &mut written).await {
                Ok(()) => {
                    self.set_status(task_id, task, TaskStatus::Completed);
                    info!("Completed download: {}", task.display_name);
                    return TransferOutcome {
                        success: true,
                        bytes_written: written,
                    };
                }
                Err(e) if policy.has_next(attempt) => {
                    self.set_status(task_id, task, TaskStatus::Retrying);
                    warn!(
                        "Error downloading {}: {}. Retrying ({}/{})...",
                        task.display_name,
                        e,
                        attempt + 1,
                        policy.max_attempts
                    );
                    tokio::time::sleep(policy.backoff).await;
                    attempt += 1;
                    self.set_status(task_id, task, TaskStatus::Downloading);
                }
                Err(e) => {
                    self.set_status(task_id, task, TaskStatus::Error);
                    error!(
                        "Failed to download {} after {} attempts: {}",
                        task.display_name, policy.max_attempts, e
                    );
                    return TransferOutcome {
                        success: false,
                        bytes_written: 0,
                    };
                }
            }
        }
    }

    fn set_status(&self, task_id: TaskId, task: &mut FileTask, status: TaskStatus) {
        task.status = status;
        self.progress.on_task_state_change(task_id, status);
    }

    /// One request-and-stream cycle
    async fn attempt(&self, task_id: TaskId, task: &FileTask, written: &mut u64) -> Result<(), DownloaderError> {
        let path = &task.target_path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                DownloaderError::filesystem_error_full("Failed to create directory", parent.display().to_string(), e.to_string())
            })?;
        }

        let existing = match fs::metadata(path).await {
            Ok(m) => m.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                return Err(DownloaderError::filesystem_error_full(
                    "Failed to stat partial file",
                    path.display().to_string(),
                    e.to_string(),
                ))
            }
        };

        let mut request = self.client.get(task.source_location.clone());
        if existing > 0 {
            debug!("Resuming {} from byte {}", task.display_name, existing);
            request = request.header(RANGE, format!("bytes={}-", existing));
        }

        let response = tokio::time::timeout(self.settings.request_timeout, request.send())
            .await
            .map_err(|_| DownloaderError::transfer_error_full("Timed out waiting for response", &task.display_name, "timeout"))?
            .map_err(|e| DownloaderError::transfer_error_full("Request failed", &task.display_name, e.to_string()))?;

        let status = response.status();
        let resume_from = match status {
            StatusCode::PARTIAL_CONTENT => existing,
            StatusCode::OK => {
                if existing > 0 {
                    warn!("Server ignored range request for {}, restarting from zero", task.display_name);
                }
                // The file is truncated, so earlier attempts' bytes no longer count
                *written = 0;
                0
            }
            StatusCode::RANGE_NOT_SATISFIABLE if existing > 0 && task.expected_size == Some(existing) => {
                debug!("{} is already complete on disk ({} bytes)", task.display_name, existing);
                self.progress.on_task_total(task_id, existing);
                return Ok(());
            }
            other => {
                return Err(DownloaderError::transfer_error_full(
                    format!("HTTP {}", other),
                    &task.display_name,
                    task.source_location.to_string(),
                ))
            }
        };

        let remaining = response.content_length().unwrap_or(0);
        let total = (resume_from + remaining).max(task.expected_size.unwrap_or(0));
        self.progress.on_task_total(task_id, total);
        trace!("{}: resume_from={} remaining={} total={}", task.display_name, resume_from, remaining, total);

        let mut file = self.open_target(task, resume_from > 0).await?;
        let chunk_size = self.settings.chunk_size.max(1);
        let mut buffer = BytesMut::with_capacity(chunk_size.min(1024 * 1024));
        let mut stream = response.bytes_stream();

        loop {
            let next = tokio::time::timeout(self.settings.request_timeout, stream.next())
                .await
                .map_err(|_| DownloaderError::transfer_error_full("Timed out waiting for data", &task.display_name, "timeout"))?;
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| {
                DownloaderError::transfer_error_full("Connection interrupted", &task.display_name, e.to_string())
            })?;
            buffer.extend_from_slice(&chunk);

            while buffer.len() >= chunk_size {
                let piece = buffer.split_to(chunk_size);
                self.write_chunk(task_id, task, &mut file, &piece, written).await?;
            }
        }
        if !buffer.is_empty() {
            self.write_chunk(task_id, task, &mut file, &buffer, written).await?;
        }

        file.flush().await.map_err(|e| {
            DownloaderError::filesystem_error_full("Failed to flush file", path.display().to_string(), e.to_string())
        })?;
        Ok(())
    }

    async fn open_target(&self, task: &FileTask, append: bool) -> Result<File, DownloaderError> {
        let path = &task.target_path;
        let opened = if append {
            OpenOptions::new().append(true).open(path).await
        } else {
            File::create(path).await
        };
        opened.map_err(|e| {
            DownloaderError::filesystem_error_full("Failed to open file for writing", path.display().to_string(), e.to_string())
        })
    }

    async fn write_chunk(
        &self,
        task_id: TaskId,
        task: &FileTask,
        file: &mut File,
        data: &[u8],
        written: &mut u64,
    ) -> Result<(), DownloaderError> {
        self.pause.wait_until_resumed().await;
        file.write_all(data).await.map_err(|e| {
            DownloaderError::filesystem_error_full("Failed to write to file", task.target_path.display().to_string(), e.to_string())
        })?;
        *written += data.len() as u64;
        self.progress.on_chunk(task_id, data.len() as u64);
        Ok(())
    }
}
