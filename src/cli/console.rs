//! Console input actor
//!
//! One task owns stdin and forwards trimmed lines over a channel. The
//! selection prompt and the batch driver both read from that channel, so
//! nothing else ever touches stdin.

use std::io::BufRead;

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Lines typed by the operator
#[derive(Debug)]
pub struct ConsoleInput {
    rx: mpsc::UnboundedReceiver<String>,
    closed: bool,
}

impl ConsoleInput {
    /// Start the stdin reader on its own thread; stdin reads cannot be
    /// cancelled.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let spawned = std::thread::Builder::new()
            .name("console-input".to_string())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line.trim().to_string()).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!("Failed to read console input: {}", e);
                            return;
                        }
                    }
                }
                debug!("Console input closed");
            });
        if let Err(e) = spawned {
            warn!("Console input unavailable: {}", e);
        }
        Self::from_receiver(rx)
    }

    pub fn from_receiver(rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self { rx, closed: false }
    }

    /// Canned input, for tests and scripted runs
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        for line in lines {
            let _ = tx.send(line.into());
        }
        Self::from_receiver(rx)
    }

    /// Next line, or `None` once the input is exhausted
    pub async fn next_line(&mut self) -> Option<String> {
        if self.closed {
            return None;
        }
        let line = self.rx.recv().await;
        if line.is_none() {
            self.closed = true;
        }
        line
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
