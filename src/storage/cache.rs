//! Manifest cache module
//!
//! Keeps the raw manifest JSON of each work next to the output directory so
//! repeated runs do not hit the catalog.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{DownloaderError, Result};
use crate::manifest::{manifest_cache_path, ManifestNode};

/// On-disk manifest cache rooted at the output directory
#[derive(Debug, Clone)]
pub struct ManifestCache {
    output_dir: PathBuf,
}

impl ManifestCache {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path_for(&self, work_id: &str) -> PathBuf {
        manifest_cache_path(&self.output_dir, work_id)
    }

    /// Load and decode a cached manifest.
    ///
    /// Returns `None` when there is no cache, when it cannot be read or
    /// decoded, or when it holds no nodes; the caller refetches.
    pub async fn load(&self, work_id: &str) -> Option<Vec<ManifestNode>> {
        let path = self.path_for(work_id);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read manifest cache {}: {}", path.display(), e);
                return None;
            }
        };

        match ManifestNode::decode_slice(&data) {
            Ok(nodes) if nodes.is_empty() => {
                debug!("Manifest cache {} is empty, refetching", path.display());
                None
            }
            Ok(nodes) => {
                info!("Loaded track list for RJ{} from cache", work_id);
                Some(nodes)
            }
            Err(e) => {
                warn!("Ignoring unusable manifest cache {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Overwrite the cache with a freshly fetched manifest
    pub async fn store(&self, work_id: &str, raw: &Value) -> Result<()> {
        let path = self.path_for(work_id);
        let data = serde_json::to_vec_pretty(raw)?;
        write_file(&path, &data).await?;
        debug!("Cached track list for RJ{} at {}", work_id, path.display());
        Ok(())
    }
}

pub(crate) async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            DownloaderError::filesystem_error_full("Failed to create directory", parent.display().to_string(), e.to_string())
        })?;
    }
    fs::write(path, data).await.map_err(|e| {
        DownloaderError::filesystem_error_full("Failed to write file", path.display().to_string(), e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("manifest_cache_{}", name))
    }

    #[tokio::test]
    async fn test_missing_cache() {
        let dir = temp_dir("missing");
        let _ = fs::remove_dir_all(&dir).await;
        let cache = ManifestCache::new(&dir);
        assert!(cache.load("1").await.is_none());
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let dir = temp_dir("store");
        let _ = fs::remove_dir_all(&dir).await;
        let cache = ManifestCache::new(&dir);
        let raw = json!([
            {"type": "folder", "title": "A", "children": [
                {"type": "audio", "title": "t1.mp3", "mediaDownloadUrl": "https://h/1", "size": 10}
            ]}
        ]);

        cache.store("7", &raw).await.unwrap();
        assert_eq!(cache.path_for("7"), dir.join("RJ7_tracks.json"));

        let nodes = cache.load("7").await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].leaf_count(), 1);

        let _ = fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_ignored() {
        let dir = temp_dir("corrupt");
        let _ = fs::remove_dir_all(&dir).await;
        fs::create_dir_all(&dir).await.unwrap();
        let cache = ManifestCache::new(&dir);
        fs::write(cache.path_for("9"), b"{not json").await.unwrap();

        assert!(cache.load("9").await.is_none());

        let _ = fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_empty_cache_is_a_miss() {
        let dir = temp_dir("empty");
        let _ = fs::remove_dir_all(&dir).await;
        let cache = ManifestCache::new(&dir);
        cache.store("4", &json!([])).await.unwrap();

        assert!(cache.load("4").await.is_none());

        let _ = fs::remove_dir_all(dir).await;
    }
}
