//! Manifest flattening module
//!
//! Turns the nested manifest tree into an ordered list of file tasks.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use url::Url;

use crate::error::{DownloaderError, Result};
use crate::manifest::layout::sanitize_name;
use crate::manifest::node::ManifestNode;
use crate::manifest::task::{FileTask, TaskStatus};

/// Flattens manifest trees into file tasks
pub struct ManifestFlattener;

impl ManifestFlattener {
    /// Flatten `nodes` below `base_dir`
    ///
    /// Traversal is depth-first with children in manifest order. Folders only
    /// extend the path of their descendants. Two leaves resolving to the same
    /// target path are rejected.
    pub fn flatten(nodes: &[ManifestNode], base_dir: &Path) -> Result<Vec<FileTask>> {
        let mut tasks = Vec::new();
        let mut seen = HashSet::new();
        Self::walk(nodes, base_dir, "", &mut tasks, &mut seen)?;
        debug!("Flattened manifest into {} tasks under {}", tasks.len(), base_dir.display());
        Ok(tasks)
    }

    fn walk(
        nodes: &[ManifestNode],
        dir: &Path,
        group_path: &str,
        tasks: &mut Vec<FileTask>,
        seen: &mut HashSet<PathBuf>,
    ) -> Result<()> {
        for node in nodes {
            match node {
                ManifestNode::Folder { title, children } => {
                    let child_group = if group_path.is_empty() {
                        title.clone()
                    } else {
                        format!("{}/{}", group_path, title)
                    };
                    Self::walk(children, &dir.join(sanitize_name(title)), &child_group, tasks, seen)?;
                }
                ManifestNode::Leaf { kind, title, address, size } => {
                    let target_path = dir.join(sanitize_name(title));
                    if !seen.insert(target_path.clone()) {
                        return Err(DownloaderError::manifest_error(format!(
                            "Two manifest entries resolve to the same path: {}",
                            target_path.display()
                        )));
                    }

                    let source_location = Url::parse(address).map_err(|e| {
                        DownloaderError::manifest_error(format!("Invalid download address for '{}'", title))
                            .with_context(e.to_string())
                    })?;

                    trace!("Task {}: {} -> {}", tasks.len() + 1, title, target_path.display());
                    tasks.push(FileTask {
                        display_name: title.clone(),
                        source_location,
                        kind: *kind,
                        target_path,
                        expected_size: *size,
                        group_path: group_path.to_string(),
                        status: TaskStatus::Pending,
                    });
                }
            }
        }
        Ok(())
    }
}
