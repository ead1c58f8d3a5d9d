//! Selection modes
//!
//! What subset of a work's files the operator wants, and the mapping between
//! the grouped listing shown to the operator and the flattened task order.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{DownloaderError, Result};
use crate::manifest::{FileKind, FileTask};

/// Audio extensions accepted by `HighQualityAudioOnly`
pub const HQ_AUDIO_EXTENSIONS: [&str; 3] = ["flac", "wav", "mp3"];

/// Which tasks of a work to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    All,
    ByDefaultTypes(BTreeSet<FileKind>),
    ByKind(FileKind),
    /// 1-based positions in the flattened task list
    ExplicitIndices(BTreeSet<usize>),
    HighQualityAudioOnly,
}

impl SelectionMode {
    /// Whether `task` (at 0-based `position`) falls under this mode
    pub fn matches(&self, position: usize, task: &FileTask) -> bool {
        match self {
            SelectionMode::All => true,
            SelectionMode::ByDefaultTypes(kinds) => kinds.contains(&task.kind),
            SelectionMode::ByKind(kind) => task.kind == *kind,
            SelectionMode::ExplicitIndices(indices) => indices.contains(&(position + 1)),
            SelectionMode::HighQualityAudioOnly => is_hq_audio(task),
        }
    }

    /// Resolve a `--select` value against a work's tasks.
    ///
    /// Accepts `all`, `default`, `audio`, `image`, `text`, `hq`, or an index
    /// list such as `1,3-5`. Index lists refer to the displayed order.
    pub fn resolve(spec: &str, defaults: &[FileKind], tasks: &[FileTask]) -> Result<Self> {
        let spec = spec.trim();
        match spec.to_ascii_lowercase().as_str() {
            "all" => Ok(SelectionMode::All),
            "default" => Ok(SelectionMode::ByDefaultTypes(defaults.iter().copied().collect())),
            "hq" => Ok(SelectionMode::HighQualityAudioOnly),
            "audio" | "image" | "text" => Ok(SelectionMode::ByKind(spec.parse()?)),
            _ => {
                let displayed = parse_index_list(spec, tasks.len())?;
                Ok(SelectionMode::ExplicitIndices(map_displayed_indices(&displayed, tasks)?))
            }
        }
    }

    /// Reject explicit indices outside `[1, len]`
    pub fn validate(&self, len: usize) -> Result<()> {
        if let SelectionMode::ExplicitIndices(indices) = self {
            if let Some(&bad) = indices.iter().find(|&&i| i < 1 || i > len) {
                return Err(out_of_range(&bad.to_string(), len));
            }
        }
        Ok(())
    }
}

fn out_of_range(what: &str, len: usize) -> DownloaderError {
    DownloaderError::selection_error_with_field(format!("Index {} is out of range (1-{})", what, len), "indices")
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMode::All => write!(f, "all files"),
            SelectionMode::ByDefaultTypes(kinds) => {
                let names: Vec<_> = kinds.iter().map(FileKind::as_str).collect();
                write!(f, "default types ({})", names.join(", "))
            }
            SelectionMode::ByKind(kind) => write!(f, "{} files", kind),
            SelectionMode::ExplicitIndices(indices) => write!(f, "{} chosen files", indices.len()),
            SelectionMode::HighQualityAudioOnly => write!(f, "high-quality audio"),
        }
    }
}

pub fn is_hq_audio(task: &FileTask) -> bool {
    task.kind == FileKind::Audio
        && task
            .extension()
            .map_or(false, |ext| HQ_AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// Parse `1,3,5` and `1-3` style lists into 1-based indices, each within `[1, len]`
pub fn parse_index_list(input: &str, len: usize) -> Result<BTreeSet<usize>> {
    let invalid = |part: &str| {
        DownloaderError::selection_error_with_field(format!("Invalid index '{}'", part.trim()), "indices")
    };

    let mut indices = BTreeSet::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: usize = start.trim().parse().map_err(|_| invalid(part))?;
                let end: usize = end.trim().parse().map_err(|_| invalid(part))?;
                if start > end {
                    return Err(invalid(part));
                }
                // Bounds first, so a huge range never gets expanded
                if start < 1 || end > len {
                    return Err(out_of_range(part, len));
                }
                indices.extend(start..=end);
            }
            None => {
                let index: usize = part.parse().map_err(|_| invalid(part))?;
                if index < 1 || index > len {
                    return Err(out_of_range(part, len));
                }
                indices.insert(index);
            }
        }
    }

    if indices.is_empty() {
        return Err(DownloaderError::selection_error_with_field("No indices given", "indices"));
    }
    Ok(indices)
}

/// Flattened positions in the order the listing shows them: grouped by
/// `group_path`, groups sorted by path with the root group first, manifest
/// order within a group.
pub fn display_order(tasks: &[FileTask]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..tasks.len()).collect();
    // Stable sort keeps manifest order inside each group
    order.sort_by(|&a, &b| tasks[a].group_path.cmp(&tasks[b].group_path));
    order
}

/// Translate displayed 1-based indices into flattened 1-based indices
pub fn map_displayed_indices(displayed: &BTreeSet<usize>, tasks: &[FileTask]) -> Result<BTreeSet<usize>> {
    SelectionMode::ExplicitIndices(displayed.clone()).validate(tasks.len())?;
    let order = display_order(tasks);
    Ok(displayed.iter().map(|&i| order[i - 1] + 1).collect())
}
