//! Progress display module
//!
//! Renders batch progress in the CLI from the events transfer workers send
//! over the progress channel.

use std::collections::HashMap;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::manifest::TaskStatus;
use crate::storage::{ProgressEvent, TaskId};

/// Aggregate statistics for one batch
#[derive(Debug, Clone, Default)]
pub struct TransferStats {
    /// Bytes written per task
    written: HashMap<TaskId, u64>,
    /// Known effective total per task
    totals: HashMap<TaskId, u64>,
    statuses: HashMap<TaskId, TaskStatus>,
    /// Current round, 0 before the first
    pub round: u32,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &ProgressEvent) {
        match *event {
            ProgressEvent::RoundStarted { round, .. } => self.round = round,
            ProgressEvent::TotalKnown { task_id, total } => {
                self.totals.insert(task_id, total);
            }
            ProgressEvent::Chunk { task_id, bytes } => {
                *self.written.entry(task_id).or_insert(0) += bytes;
            }
            ProgressEvent::StateChanged { task_id, status } => {
                self.statuses.insert(task_id, status);
            }
        }
    }

    /// Bytes written this batch
    pub fn downloaded(&self) -> u64 {
        self.written.values().sum()
    }

    /// Sum of the totals known so far
    pub fn known_total(&self) -> u64 {
        self.totals.values().sum()
    }

    /// Tasks currently transferring
    pub fn active(&self) -> usize {
        self.statuses
            .values()
            .filter(|s| matches!(s, TaskStatus::Downloading | TaskStatus::Retrying))
            .count()
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.statuses.values().filter(|s| **s == status).count()
    }

    /// Format bytes to human readable string
    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_index])
    }

    /// Format speed to human readable string
    pub fn format_speed(bytes_per_sec: f64) -> String {
        format!("{}/s", Self::format_bytes(bytes_per_sec as u64))
    }

    /// Format duration to human readable string
    pub fn format_duration(duration: Duration) -> String {
        let total_secs = duration.as_secs();
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Calculate ETA based on download speed and remaining bytes
    pub fn calculate_eta(downloaded: u64, total: u64, speed: f64) -> Option<Duration> {
        if speed <= 0.0 || downloaded >= total {
            return None;
        }

        let remaining = total.saturating_sub(downloaded) as f64;
        Some(Duration::from_secs_f64(remaining / speed))
    }
}

/// Throttled single-line progress renderer
pub struct ProgressDisplay {
    start_time: Instant,
    last_update: Option<Instant>,
    update_interval: Duration,
    /// Quiet mode (no progress output)
    quiet: bool,
}

impl ProgressDisplay {
    pub fn new(quiet: bool) -> Self {
        Self::with_interval(quiet, Duration::from_millis(500))
    }

    pub fn with_interval(quiet: bool, interval: Duration) -> Self {
        Self {
            start_time: Instant::now(),
            last_update: None,
            update_interval: interval,
            quiet,
        }
    }

    /// Redraw the progress line if the update interval has passed
    pub fn update(&mut self, stats: &TransferStats) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        if self.last_update.is_some_and(|t| t.elapsed() < self.update_interval) {
            return Ok(());
        }
        self.last_update = Some(Instant::now());

        print!("\r\x1b[2K{}", self.render_line(stats));
        io::stdout().flush()
    }

    /// Build the progress line
    pub fn render_line(&self, stats: &TransferStats) -> String {
        let downloaded = stats.downloaded();
        let total = stats.known_total();
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let speed = if elapsed > 0.0 { downloaded as f64 / elapsed } else { 0.0 };

        let (bar, percent) = if total > 0 {
            let fraction = (downloaded as f64 / total as f64).min(1.0);
            let bar_width: usize = 30;
            let filled = (fraction * bar_width as f64) as usize;
            ("=".repeat(filled) + &" ".repeat(bar_width - filled), format!("{:.1}%", fraction * 100.0))
        } else {
            (" ".repeat(30), "?".to_string())
        };

        let eta = TransferStats::calculate_eta(downloaded, total, speed)
            .map(TransferStats::format_duration)
            .unwrap_or_else(|| "-".to_string());

        format!(
            "[{}] {} | {} / {} | {} | Active: {} | Done: {} | ETA: {}",
            bar,
            percent,
            TransferStats::format_bytes(downloaded),
            TransferStats::format_bytes(total),
            TransferStats::format_speed(speed),
            stats.active(),
            stats.count(TaskStatus::Completed),
            eta,
        )
    }

    /// Clear the progress line
    pub fn finish(&self) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        print!("\r\x1b[2K");
        io::stdout().flush()
    }

    /// Print a status message
    pub fn print_status(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        println!("\r\x1b[2K{}", message);
        Ok(())
    }

    /// Get the elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}

/// Drain progress events until every sender is gone, rendering as they come
pub fn spawn_renderer(mut rx: UnboundedReceiver<ProgressEvent>, quiet: bool) -> JoinHandle<TransferStats> {
    tokio::spawn(async move {
        let mut stats = TransferStats::new();
        let mut display = ProgressDisplay::new(quiet);

        while let Some(event) = rx.recv().await {
            if let ProgressEvent::RoundStarted { round, tasks } = event {
                let _ = display.print_status(&format!(
                    "Round {}: {} files (type 'p' + Enter to pause, 'r' + Enter to resume)",
                    round, tasks
                ));
            }
            stats.apply(&event);
            if display.update(&stats).is_err() {
                debug!("Progress line could not be written");
            }
        }

        let _ = display.finish();
        stats
    })
}
