//! Pause control module
//!
//! A cooperative pause flag shared by every transfer of a batch. The
//! `PauseController` is the only writer; transfers hold read-only
//! `PauseFlag` handles and check them between chunks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

/// Poll interval while paused
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Commands accepted by the pause controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseCommand {
    Pause,
    Resume,
}

impl PauseCommand {
    /// Parse a console line (`p`/`pause`, `r`/`resume`)
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" => Some(PauseCommand::Pause),
            "r" | "resume" => Some(PauseCommand::Resume),
            _ => None,
        }
    }
}

/// Owner of the pause flag
#[derive(Debug, Default)]
pub struct PauseController {
    paused: Arc<AtomicBool>,
}

impl PauseController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only handle for transfers
    pub fn flag(&self) -> PauseFlag {
        PauseFlag {
            paused: self.paused.clone(),
            poll_interval: PAUSE_POLL_INTERVAL,
        }
    }

    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            info!("Downloads paused. Enter 'r' to resume.");
        }
    }

    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            info!("Downloads resumed.");
        }
    }

    pub fn apply(&self, command: PauseCommand) {
        match command {
            PauseCommand::Pause => self.pause(),
            PauseCommand::Resume => self.resume(),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// Read-only view of the pause flag
#[derive(Debug, Clone)]
pub struct PauseFlag {
    paused: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl PauseFlag {
    /// A flag no controller will ever set
    pub fn never() -> Self {
        PauseController::new().flag()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Sleep-poll until the flag is cleared. Returns immediately when not paused.
    pub async fn wait_until_resumed(&self) {
        while self.is_paused() {
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
