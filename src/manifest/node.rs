//! Manifest node module
//!
//! Decodes the catalog's nested track listing into a tagged tree once, at the
//! API boundary.

use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::{DownloaderError, Result};
use crate::manifest::task::FileKind;

/// A node of a work's manifest
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestNode {
    Folder {
        title: String,
        children: Vec<ManifestNode>,
    },
    Leaf {
        kind: FileKind,
        title: String,
        address: String,
        size: Option<u64>,
    },
}

/// Wire shape of a manifest entry, as sent by the catalog
#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(rename = "type")]
    kind: Option<FileKind>,
    title: Option<String>,
    children: Option<Vec<RawNode>>,
    #[serde(rename = "mediaDownloadUrl")]
    media_download_url: Option<String>,
    size: Option<u64>,
}

impl ManifestNode {
    /// Decode a manifest from raw JSON bytes
    pub fn decode_slice(data: &[u8]) -> Result<Vec<ManifestNode>> {
        let value: serde_json::Value = serde_json::from_slice(data)?;
        Self::decode(value)
    }

    /// Decode a manifest from a JSON value
    ///
    /// Every node must carry a type and a title; folders need children and
    /// leaves need a download address. The first missing field fails the
    /// whole manifest.
    pub fn decode(value: serde_json::Value) -> Result<Vec<ManifestNode>> {
        let raw: Vec<RawNode> = serde_json::from_value(value).map_err(|e| {
            DownloaderError::manifest_error("Manifest is not a list of nodes").with_context(e.to_string())
        })?;
        let nodes = raw
            .into_iter()
            .enumerate()
            .map(|(i, node)| node.into_node(&format!("[{}]", i)))
            .collect::<Result<Vec<_>>>()?;
        debug!("Decoded manifest with {} top-level nodes", nodes.len());
        Ok(nodes)
    }

    pub fn title(&self) -> &str {
        match self {
            ManifestNode::Folder { title, .. } | ManifestNode::Leaf { title, .. } => title,
        }
    }

    /// Number of leaves below (and including) this node
    #[cfg(test)]
    pub(crate) fn leaf_count(&self) -> usize {
        match self {
            ManifestNode::Folder { children, .. } => children.iter().map(|c| c.leaf_count()).sum(),
            ManifestNode::Leaf { .. } => 1,
        }
    }
}

impl RawNode {
    fn into_node(self, at: &str) -> Result<ManifestNode> {
        let kind = self.kind.ok_or_else(|| missing("type", at))?;
        let title = match self.title {
            Some(t) if !t.is_empty() => t,
            _ => return Err(missing("title", at)),
        };
        trace!("Decoding {} node '{}' at {}", kind, title, at);

        match kind {
            FileKind::Folder => {
                let children = self.children.ok_or_else(|| missing("children", at))?;
                let children = children
                    .into_iter()
                    .enumerate()
                    .map(|(i, child)| child.into_node(&format!("{}/{}[{}]", at, title, i)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ManifestNode::Folder { title, children })
            }
            kind => {
                let address = self
                    .media_download_url
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| missing("mediaDownloadUrl", at))?;
                Ok(ManifestNode::Leaf {
                    kind,
                    title,
                    address,
                    size: self.size,
                })
            }
        }
    }
}

fn missing(field: &str, at: &str) -> DownloaderError {
    DownloaderError::ManifestError {
        message: format!("Manifest node {} is missing required field '{}'", at, field),
        work_id: None,
        source: None,
    }
}
