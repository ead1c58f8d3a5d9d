//! Integrity check module
//!
//! Decides whether a task's file is already satisfied on disk.

use tokio::fs;
use tracing::trace;

use crate::manifest::FileTask;

/// How completed files are recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrityCheck {
    /// The target path exists. Cannot detect truncated files.
    #[default]
    Existence,
    /// The target path exists and, when the manifest knows the size, matches it
    SizeAware,
}

impl IntegrityCheck {
    pub fn from_verify_size(verify_size: bool) -> Self {
        if verify_size {
            IntegrityCheck::SizeAware
        } else {
            IntegrityCheck::Existence
        }
    }

    /// Read-only stat of the task's target path
    pub async fn is_satisfied(&self, task: &FileTask) -> bool {
        let metadata = match fs::metadata(&task.target_path).await {
            Ok(m) => m,
            Err(_) => return false,
        };

        let satisfied = match (self, task.expected_size) {
            (IntegrityCheck::SizeAware, Some(expected)) => metadata.len() == expected,
            _ => true,
        };
        trace!(
            "Integrity {:?} for {}: {} ({} bytes on disk)",
            self,
            task.display_name,
            satisfied,
            metadata.len()
        );
        satisfied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{FileKind, TaskStatus};
    use std::path::PathBuf;
    use url::Url;

    fn task(path: PathBuf, size: Option<u64>) -> FileTask {
        FileTask {
            display_name: "f.bin".to_string(),
            source_location: Url::parse("http://127.0.0.1/f.bin").unwrap(),
            kind: FileKind::Audio,
            target_path: path,
            expected_size: size,
            group_path: String::new(),
            status: TaskStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_missing_file_not_satisfied() {
        let path = std::env::temp_dir().join("integrity_missing").join("nope.bin");
        let t = task(path, Some(10));
        assert!(!IntegrityCheck::Existence.is_satisfied(&t).await);
        assert!(!IntegrityCheck::SizeAware.is_satisfied(&t).await);
    }

    #[tokio::test]
    async fn test_existence_accepts_partial_file() {
        let dir = std::env::temp_dir().join("integrity_partial");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("partial.bin");
        tokio::fs::write(&path, vec![0u8; 4]).await.unwrap();

        let t = task(path, Some(10));
        assert!(IntegrityCheck::Existence.is_satisfied(&t).await);
        assert!(!IntegrityCheck::SizeAware.is_satisfied(&t).await);

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_size_aware_full_and_unknown() {
        let dir = std::env::temp_dir().join("integrity_size_aware");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("full.bin");
        tokio::fs::write(&path, vec![0u8; 10]).await.unwrap();

        assert!(IntegrityCheck::SizeAware.is_satisfied(&task(path.clone(), Some(10))).await);
        assert!(IntegrityCheck::SizeAware.is_satisfied(&task(path, None)).await);

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[test]
    fn test_from_verify_size() {
        assert_eq!(IntegrityCheck::from_verify_size(false), IntegrityCheck::Existence);
        assert_eq!(IntegrityCheck::from_verify_size(true), IntegrityCheck::SizeAware);
        assert_eq!(IntegrityCheck::default(), IntegrityCheck::Existence);
    }
}
