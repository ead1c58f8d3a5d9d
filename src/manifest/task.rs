//! File task module
//!
//! A file task is one flattened, downloadable file of a work.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::DownloaderError;

/// Kind of a manifest entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Folder entries only shape paths and never become tasks
    Folder,
    Text,
    Image,
    Audio,
}

impl FileKind {
    /// Kinds that can be downloaded
    pub const DOWNLOADABLE: [FileKind; 3] = [FileKind::Audio, FileKind::Image, FileKind::Text];

    /// Lowercase name as used by the catalog and the config file
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Folder => "folder",
            FileKind::Text => "text",
            FileKind::Image => "image",
            FileKind::Audio => "audio",
        }
    }

    pub fn is_downloadable(&self) -> bool {
        *self != FileKind::Folder
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = DownloaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "folder" => Ok(FileKind::Folder),
            "text" => Ok(FileKind::Text),
            "image" => Ok(FileKind::Image),
            "audio" => Ok(FileKind::Audio),
            other => Err(DownloaderError::selection_error_with_field(
                format!("Unknown file type '{}'", other),
                "kind",
            )),
        }
    }
}

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Pending,
    Downloading,
    Retrying,
    Completed,
    Skipped,
    Error,
}

impl TaskStatus {
    /// Whether the task reached a final state for this round
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Skipped | TaskStatus::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Downloading => "Downloading",
            TaskStatus::Retrying => "Retrying",
            TaskStatus::Completed => "Completed",
            TaskStatus::Skipped => "Skipped",
            TaskStatus::Error => "Error",
        };
        f.write_str(s)
    }
}

/// One downloadable file
#[derive(Debug, Clone, PartialEq)]
pub struct FileTask {
    /// Leaf name for display and logging
    pub display_name: String,
    /// Remote fetch address
    pub source_location: Url,
    /// Never `FileKind::Folder`
    pub kind: FileKind,
    /// Absolute local destination
    pub target_path: PathBuf,
    /// Size reported by the manifest, if any
    pub expected_size: Option<u64>,
    /// Slash-joined ancestor folder titles, empty at the work root
    pub group_path: String,
    pub status: TaskStatus,
}

impl FileTask {
    /// Size as shown to the operator
    pub fn size_label(&self) -> String {
        match self.expected_size {
            Some(size) => format!("{:.2} MB", size as f64 / 1024.0 / 1024.0),
            None => "Unknown size".to_string(),
        }
    }

    /// File extension, lowercased
    pub fn extension(&self) -> Option<String> {
        self.display_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str) -> FileTask {
        FileTask {
            display_name: name.to_string(),
            source_location: Url::parse("https://example.com/f").unwrap(),
            kind: FileKind::Audio,
            target_path: PathBuf::from("/tmp").join(name),
            expected_size: Some(1024 * 1024),
            group_path: String::new(),
            status: TaskStatus::Pending,
        }
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Audio".parse::<FileKind>().unwrap(), FileKind::Audio);
        assert_eq!(" image ".parse::<FileKind>().unwrap(), FileKind::Image);
        assert!("video".parse::<FileKind>().is_err());
    }

    #[test]
    fn test_kind_serde_lowercase() {
        let json = serde_json::to_string(&FileKind::Text).unwrap();
        assert_eq!(json, "\"text\"");
        let kind: FileKind = serde_json::from_str("\"folder\"").unwrap();
        assert!(!kind.is_downloadable());
    }

    #[test]
    fn test_size_label() {
        let mut t = task("a.mp3");
        assert_eq!(t.size_label(), "1.00 MB");
        t.expected_size = None;
        assert_eq!(t.size_label(), "Unknown size");
    }

    #[test]
    fn test_extension() {
        assert_eq!(task("Track 01.FLAC").extension().as_deref(), Some("flac"));
        assert_eq!(task("README").extension(), None);
    }

    #[test]
    fn test_status_terminal() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
        assert!(!TaskStatus::Retrying.is_terminal());
        assert_eq!(TaskStatus::default(), TaskStatus::Pending);
    }
}
