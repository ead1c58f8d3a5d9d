//! Selection filter
//!
//! Marks tasks already satisfied on disk as skipped and picks the subset
//! to transfer.

use tracing::{debug, info};

use crate::error::Result;
use crate::manifest::{FileTask, TaskStatus};
use crate::selection::mode::SelectionMode;
use crate::storage::IntegrityCheck;

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionFilter {
    integrity: IntegrityCheck,
}

impl SelectionFilter {
    pub fn new(integrity: IntegrityCheck) -> Self {
        Self { integrity }
    }

    /// Check every task on disk, marking satisfied ones `Skipped`.
    ///
    /// Returns one flag per task, `true` when already downloaded.
    pub async fn mark_satisfied(&self, tasks: &mut [FileTask]) -> Vec<bool> {
        let mut satisfied = Vec::with_capacity(tasks.len());
        for task in tasks.iter_mut() {
            let done = self.integrity.is_satisfied(task).await;
            if done {
                task.status = TaskStatus::Skipped;
            }
            satisfied.push(done);
        }
        satisfied
    }

    /// Evaluate integrity for every task, then return the selected tasks
    /// that are not skipped. An empty result means nothing to do.
    pub async fn apply(&self, tasks: &mut [FileTask], mode: &SelectionMode) -> Result<Vec<FileTask>> {
        mode.validate(tasks.len())?;
        let satisfied = self.mark_satisfied(tasks).await;

        let selected: Vec<FileTask> = tasks
            .iter()
            .enumerate()
            .filter(|(i, task)| !satisfied[*i] && mode.matches(*i, task))
            .map(|(_, task)| task.clone())
            .collect();

        let skipped = satisfied.iter().filter(|s| **s).count();
        debug!("{} of {} files already on disk", skipped, tasks.len());
        info!("Selected {} files ({})", selected.len(), mode);
        Ok(selected)
    }
}
