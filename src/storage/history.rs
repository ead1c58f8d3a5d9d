//! Completed-works history
//!
//! `history.json` in the output directory lists every work whose batch
//! finished without failures. It is informational only.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use crate::error::Result;
use crate::storage::cache::write_file;

pub const HISTORY_FILE: &str = "history.json";

/// One completed work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub work_id: String,
    pub title: Option<String>,
    pub completed_at: DateTime<Utc>,
    /// Files of the manifest verified on disk
    pub files: usize,
}

#[derive(Debug, Clone)]
pub struct WorkHistory {
    path: PathBuf,
}

impl WorkHistory {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            path: output_dir.join(HISTORY_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries; an unreadable history counts as empty
    pub async fn load(&self) -> Vec<HistoryEntry> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to read history {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        serde_json::from_slice(&data).unwrap_or_else(|e| {
            warn!("Ignoring unreadable history {}: {}", self.path.display(), e);
            Vec::new()
        })
    }

    /// Record a completed work, replacing any earlier entry for the same id
    pub async fn record(&self, entry: HistoryEntry) -> Result<()> {
        let mut entries = self.load().await;
        entries.retain(|e| e.work_id != entry.work_id);
        info!("Recording RJ{} in download history", entry.work_id);
        entries.push(entry);

        let data = serde_json::to_vec_pretty(&entries)?;
        write_file(&self.path, &data).await
    }
}

impl HistoryEntry {
    pub fn new(work_id: impl Into<String>, title: Option<String>, files: usize) -> Self {
        Self {
            work_id: work_id.into(),
            title,
            completed_at: Utc::now(),
            files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("work_history_{}", name))
    }

    #[tokio::test]
    async fn test_empty_history() {
        let dir = temp_dir("empty");
        let _ = fs::remove_dir_all(&dir).await;
        assert!(WorkHistory::new(&dir).load().await.is_empty());
    }

    #[tokio::test]
    async fn test_record_replaces_same_work() {
        let dir = temp_dir("replace");
        let _ = fs::remove_dir_all(&dir).await;
        let history = WorkHistory::new(&dir);

        history.record(HistoryEntry::new("1", Some("First".into()), 3)).await.unwrap();
        history.record(HistoryEntry::new("2", None, 1)).await.unwrap();
        history.record(HistoryEntry::new("1", Some("First".into()), 4)).await.unwrap();

        let entries = history.load().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].work_id, "2");
        assert_eq!(entries[1].work_id, "1");
        assert_eq!(entries[1].files, 4);

        let raw = fs::read_to_string(history.path()).await.unwrap();
        assert!(raw.contains("completed_at"));

        let _ = fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_corrupt_history_counts_as_empty() {
        let dir = temp_dir("corrupt");
        let _ = fs::remove_dir_all(&dir).await;
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join(HISTORY_FILE), b"[{").await.unwrap();

        assert!(WorkHistory::new(&dir).load().await.is_empty());

        let _ = fs::remove_dir_all(dir).await;
    }
}
