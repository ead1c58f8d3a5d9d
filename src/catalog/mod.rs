//! Catalog module
//!
//! Access to the remote work catalog: track manifests, work metadata and
//! search.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use client::{build_http_client, CatalogClient, DEFAULT_BASE_URL};

/// Descriptive data of a work
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "mainCoverUrl")]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub circle: Option<Circle>,
    #[serde(default)]
    pub release: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    #[serde(default)]
    pub name: Option<String>,
}

impl WorkMetadata {
    pub fn circle_name(&self) -> Option<&str> {
        self.circle.as_ref().and_then(|c| c.name.as_deref())
    }
}

/// The remote catalog as the work pipeline sees it
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Raw manifest JSON of a work
    async fn fetch_manifest(&self, work_id: &str) -> Result<serde_json::Value>;

    async fn fetch_metadata(&self, work_id: &str) -> Result<WorkMetadata>;

    /// At most `limit` work ids matching `query`
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;
}
