//! Progress reporting module
//!
//! Transfers report byte-level progress and state changes through a
//! `ProgressSink`. Implementations must return quickly; the channel sink
//! never blocks.

use tokio::sync::mpsc;

use crate::manifest::TaskStatus;

/// Position of a task within its batch
pub type TaskId = usize;

/// A progress notification
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A new round of `tasks` transfers begins
    RoundStarted { round: u32, tasks: usize },
    /// The effective total size of a task became known
    TotalKnown { task_id: TaskId, total: u64 },
    /// Bytes were written to a task's file
    Chunk { task_id: TaskId, bytes: u64 },
    /// A task changed state
    StateChanged { task_id: TaskId, status: TaskStatus },
}

/// Receiver of transfer progress
pub trait ProgressSink: Send + Sync {
    fn on_chunk(&self, task_id: TaskId, bytes_written: u64);

    fn on_task_state_change(&self, task_id: TaskId, status: TaskStatus);

    fn on_task_total(&self, _task_id: TaskId, _total: u64) {}

    fn on_round_start(&self, _round: u32, _tasks: usize) {}
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_chunk(&self, _task_id: TaskId, _bytes_written: u64) {}

    fn on_task_state_change(&self, _task_id: TaskId, _status: TaskStatus) {}
}

/// Forwards progress over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ProgressEvent) {
        // The renderer may already be gone during shutdown
        let _ = self.tx.send(event);
    }
}

impl ProgressSink for ChannelProgress {
    fn on_chunk(&self, task_id: TaskId, bytes_written: u64) {
        self.send(ProgressEvent::Chunk { task_id, bytes: bytes_written });
    }

    fn on_task_state_change(&self, task_id: TaskId, status: TaskStatus) {
        self.send(ProgressEvent::StateChanged { task_id, status });
    }

    fn on_task_total(&self, task_id: TaskId, total: u64) {
        self.send(ProgressEvent::TotalKnown { task_id, total });
    }

    fn on_round_start(&self, round: u32, tasks: usize) {
        self.send(ProgressEvent::RoundStarted { round, tasks });
    }
}

/// Records every event, for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
}

#[cfg(test)]
impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn bytes_for(&self, task_id: TaskId) -> u64 {
        self.events()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Chunk { task_id: id, bytes } if *id == task_id => Some(*bytes),
                _ => None,
            })
            .sum()
    }

    pub fn statuses_for(&self, task_id: TaskId) -> Vec<TaskStatus> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::StateChanged { task_id: id, status } if *id == task_id => Some(*status),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
impl ProgressSink for RecordingProgress {
    fn on_chunk(&self, task_id: TaskId, bytes_written: u64) {
        self.push(ProgressEvent::Chunk { task_id, bytes: bytes_written });
    }

    fn on_task_state_change(&self, task_id: TaskId, status: TaskStatus) {
        self.push(ProgressEvent::StateChanged { task_id, status });
    }

    fn on_task_total(&self, task_id: TaskId, total: u64) {
        self.push(ProgressEvent::TotalKnown { task_id, total });
    }

    fn on_round_start(&self, round: u32, tasks: usize) {
        self.push(ProgressEvent::RoundStarted { round, tasks });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_progress_forwards_events() {
        let (sink, mut rx) = ChannelProgress::new();
        sink.on_round_start(1, 2);
        sink.on_task_total(0, 100);
        sink.on_chunk(0, 40);
        sink.on_task_state_change(0, TaskStatus::Completed);

        assert_eq!(rx.recv().await, Some(ProgressEvent::RoundStarted { round: 1, tasks: 2 }));
        assert_eq!(rx.recv().await, Some(ProgressEvent::TotalKnown { task_id: 0, total: 100 }));
        assert_eq!(rx.recv().await, Some(ProgressEvent::Chunk { task_id: 0, bytes: 40 }));
        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent::StateChanged { task_id: 0, status: TaskStatus::Completed })
        );
    }

    #[test]
    fn test_channel_progress_survives_dropped_receiver() {
        let (sink, rx) = ChannelProgress::new();
        drop(rx);
        sink.on_chunk(3, 10);
    }

    #[test]
    fn test_recording_progress() {
        let sink = RecordingProgress::default();
        sink.on_chunk(1, 5);
        sink.on_chunk(1, 7);
        sink.on_chunk(2, 1);
        sink.on_task_state_change(1, TaskStatus::Downloading);
        assert_eq!(sink.bytes_for(1), 12);
        assert_eq!(sink.statuses_for(1), vec![TaskStatus::Downloading]);
    }
}
