//! Download scheduler module
//!
//! Runs a batch of file tasks through a bounded pool of transfer workers,
//! re-submitting whatever is still unsatisfied on disk for up to a fixed
//! number of rounds.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::manifest::{FileTask, TaskStatus};
use crate::storage::integrity::IntegrityCheck;
use crate::storage::pause::PauseFlag;
use crate::storage::progress::{ProgressSink, TaskId};
use crate::storage::retry::RetryPolicy;
use crate::storage::transfer::{TransferOutcome, TransferSettings, TransferUnit};

/// Default number of simultaneous transfers
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Default number of batch rounds
pub const DEFAULT_ROUNDS: u32 = 3;

/// Scheduler tunables
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// Gate capacity
    pub concurrency: usize,
    /// Batch rounds; `max_attempts` is the round ceiling
    pub rounds: RetryPolicy,
    pub transfer: TransferSettings,
    pub integrity: IntegrityCheck,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            rounds: RetryPolicy::new(DEFAULT_ROUNDS, Duration::ZERO),
            transfer: TransferSettings::default(),
            integrity: IntegrityCheck::default(),
        }
    }
}

/// What one worker hands back
#[derive(Debug, Clone, Copy)]
struct WorkerReport {
    task_id: TaskId,
    status: TaskStatus,
    outcome: TransferOutcome,
}

/// Result of running a batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// The batch's tasks with their final statuses
    pub tasks: Vec<FileTask>,
    /// Successful transfer units, over all rounds
    pub transfers_succeeded: usize,
    /// Bytes written by successful transfer units
    pub bytes_transferred: u64,
    pub rounds: u32,
    pub elapsed: Duration,
    /// Tasks left unsatisfied after the last round or ending in error
    pub failed: Vec<TaskId>,
}

impl BatchReport {
    pub fn megabytes(&self) -> f64 {
        self.bytes_transferred as f64 / 1024.0 / 1024.0
    }

    pub fn failed_tasks(&self) -> impl Iterator<Item = &FileTask> {
        self.failed.iter().filter_map(|&id| self.tasks.get(id))
    }
}

/// Bounded-concurrency batch runner
pub struct DownloadScheduler {
    unit: TransferUnit,
    settings: SchedulerSettings,
    progress: Arc<dyn ProgressSink>,
}

impl DownloadScheduler {
    pub fn new(
        client: Client,
        settings: SchedulerSettings,
        pause: PauseFlag,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        info!("Creating download scheduler (concurrency: {})", settings.concurrency);
        let unit = TransferUnit::new(client, settings.transfer, pause, progress.clone());
        Self {
            unit,
            settings,
            progress,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Run `tasks` to completion or exhaustion
    pub async fn run(&self, mut tasks: Vec<FileTask>) -> BatchReport {
        let started = Instant::now();
        let rounds = self.settings.rounds;
        let mut remaining: Vec<TaskId> = (0..tasks.len()).collect();
        let mut transfers_succeeded = 0;
        let mut bytes_transferred = 0u64;
        let mut round = 0;

        while !remaining.is_empty() && round < rounds.max_attempts {
            round += 1;
            info!(
                "Starting download for {} files (round {}/{})",
                remaining.len(),
                round,
                rounds.max_attempts
            );
            self.progress.on_round_start(round, remaining.len());

            for report in self.run_round(&tasks, &remaining).await {
                tasks[report.task_id].status = report.status;
                if report.outcome.success {
                    transfers_succeeded += 1;
                    bytes_transferred += report.outcome.bytes_written;
                }
            }

            let mut unsatisfied = Vec::new();
            for id in remaining {
                if !self.settings.integrity.is_satisfied(&tasks[id]).await {
                    warn!("File {} not found. Scheduling for retry.", tasks[id].display_name);
                    unsatisfied.push(id);
                }
            }
            remaining = unsatisfied;

            if !remaining.is_empty() {
                if rounds.has_next(round) {
                    info!("Retrying {} failed files...", remaining.len());
                    if !rounds.backoff.is_zero() {
                        tokio::time::sleep(rounds.backoff).await;
                    }
                } else {
                    error!(
                        "Failed to download {} files after {} rounds",
                        remaining.len(),
                        rounds.max_attempts
                    );
                }
            }
        }

        let mut failed = remaining;
        for (id, task) in tasks.iter().enumerate() {
            if task.status == TaskStatus::Error && !failed.contains(&id) {
                failed.push(id);
            }
        }
        failed.sort_unstable();

        BatchReport {
            tasks,
            transfers_succeeded,
            bytes_transferred,
            rounds: round,
            elapsed: started.elapsed(),
            failed,
        }
    }

    /// Fan out one round over the gate and join every worker
    async fn run_round(&self, tasks: &[FileTask], ids: &[TaskId]) -> Vec<WorkerReport> {
        let gate = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut workers = JoinSet::new();

        for &task_id in ids {
            let gate = gate.clone();
            let unit = self.unit.clone();
            let mut task = tasks[task_id].clone();

            workers.spawn(async move {
                let failed = WorkerReport {
                    task_id,
                    status: TaskStatus::Error,
                    outcome: TransferOutcome {
                        success: false,
                        bytes_written: 0,
                    },
                };
                // The permit is released when it drops, whatever the outcome
                let Ok(_permit) = gate.acquire_owned().await else {
                    error!("Download gate closed before {} could start", task.display_name);
                    return failed;
                };

                let result = AssertUnwindSafe(unit.run(task_id, &mut task)).catch_unwind().await;
                match result {
                    Ok(outcome) => WorkerReport {
                        task_id,
                        status: task.status,
                        outcome,
                    },
                    Err(_) => {
                        error!("Download worker for {} panicked", task.display_name);
                        failed
                    }
                }
            });
        }

        let mut reports = Vec::with_capacity(ids.len());
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!("Download worker could not be joined: {}", e),
            }
        }
        debug!("Round finished with {} worker reports", reports.len());
        reports
    }
}

/// Per-batch summary handed to the operator
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    /// Tasks of the whole manifest satisfied on disk
    pub files_verified: usize,
    pub files_total: usize,
    pub total_megabytes: f64,
    pub elapsed_seconds: f64,
    pub average_mbps: f64,
    pub failed_task_names: Vec<String>,
}

impl BatchSummary {
    /// Verify every task of the manifest on disk and fold in the batch report
    pub async fn verify(all_tasks: &[FileTask], report: Option<&BatchReport>, integrity: IntegrityCheck) -> Self {
        let mut files_verified = 0;
        for task in all_tasks {
            if integrity.is_satisfied(task).await {
                files_verified += 1;
            }
        }

        let (total_megabytes, elapsed_seconds, failed_task_names) = match report {
            Some(report) => (
                report.megabytes(),
                report.elapsed.as_secs_f64(),
                report.failed_tasks().map(|t| t.display_name.clone()).collect(),
            ),
            None => (0.0, 0.0, Vec::new()),
        };

        Self {
            files_verified,
            files_total: all_tasks.len(),
            total_megabytes,
            elapsed_seconds,
            average_mbps: average_speed(total_megabytes, elapsed_seconds),
            failed_task_names,
        }
    }
}

/// Average throughput, zero when nothing was transferred or no time passed
pub fn average_speed(megabytes: f64, seconds: f64) -> f64 {
    if seconds > 0.0 && megabytes > 0.0 {
        megabytes / seconds
    } else {
        0.0
    }
}
