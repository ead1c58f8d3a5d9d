//! Catalog HTTP client
//!
//! Talks to the asmr.one API. Unavailable answers are retried under the
//! shared retry policy; missing works are reported as `NotFound` at once.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Client, Proxy, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::catalog::{Catalog, WorkMetadata};
use crate::error::{DownloaderError, Result};
use crate::storage::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.asmr-200.com";

/// Per-request timeout for catalog calls
pub const CATALOG_TIMEOUT: Duration = Duration::from_secs(30);

pub const SEARCH_PAGE_SIZE: usize = 50;

/// Pause between search pages
pub const SEARCH_PAGE_DELAY: Duration = Duration::from_secs(1);

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Build the HTTP client shared by catalog calls and file transfers
pub fn build_http_client(proxy: Option<&str>) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ORIGIN, HeaderValue::from_static("https://asmr.one"));
    headers.insert(REFERER, HeaderValue::from_static("https://asmr.one/"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let mut builder = Client::builder().default_headers(headers);
    if let Some(proxy) = proxy.map(str::trim).filter(|p| !p.is_empty()) {
        info!("Using proxy {}", proxy);
        let proxy = Proxy::all(proxy).map_err(|e| {
            DownloaderError::config_error_with_field(format!("Invalid proxy '{}': {}", proxy, e), "proxy")
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| DownloaderError::config_error(format!("Failed to build HTTP client: {}", e)))
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    works: Vec<SearchWork>,
}

#[derive(Debug, Deserialize)]
struct SearchWork {
    #[serde(default)]
    id: Option<u64>,
}

/// asmr.one catalog client
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
    page_delay: Duration,
}

impl CatalogClient {
    pub fn new(client: Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: Url::parse(DEFAULT_BASE_URL)?,
            retry: RetryPolicy::default(),
            page_delay: SEARCH_PAGE_DELAY,
        })
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// GET `url` and decode the JSON body, retrying unavailable answers
    async fn get_json<T: DeserializeOwned>(&self, url: Url, label: &str) -> Result<T> {
        self.retry
            .run(label, move |attempt| {
                debug!("GET {} (attempt {})", url, attempt);
                self.get_once(url.clone())
            })
            .await
    }

    async fn get_once<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .client
            .get(url.clone())
            .timeout(CATALOG_TIMEOUT)
            .send()
            .await
            .map_err(|e| DownloaderError::catalog_unavailable(format!("Request to {} failed", url), e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DownloaderError::catalog_not_found(format!("{} returned 404", url.path())));
        }
        if !status.is_success() {
            return Err(DownloaderError::catalog_unavailable(
                format!("{} returned HTTP {}", url.path(), status.as_u16()),
                status.to_string(),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DownloaderError::catalog_unavailable(format!("Unreadable answer from {}", url.path()), e.to_string()))
    }
}

#[async_trait]
impl Catalog for CatalogClient {
    async fn fetch_manifest(&self, work_id: &str) -> Result<serde_json::Value> {
        let mut url = self.endpoint(&format!("/api/tracks/{}", work_id))?;
        url.query_pairs_mut().append_pair("v", "2");
        let value: serde_json::Value = self
            .get_json(url, &format!("fetching tracks for RJ{}", work_id))
            .await?;
        info!("Fetched track list for RJ{}", work_id);
        Ok(value)
    }

    async fn fetch_metadata(&self, work_id: &str) -> Result<WorkMetadata> {
        let url = self.endpoint(&format!("/api/workInfo/{}", work_id))?;
        let metadata: WorkMetadata = self
            .get_json(url, &format!("fetching metadata for RJ{}", work_id))
            .await?;
        info!("Fetched metadata for RJ{}", work_id);
        Ok(metadata)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page = 1usize;

        while ids.len() < limit {
            let mut url = self.endpoint("/api/search")?;
            url.query_pairs_mut()
                .append_pair("query", query)
                .append_pair("page", &page.to_string())
                .append_pair("size", &SEARCH_PAGE_SIZE.to_string());

            let result: Result<SearchPage> = self
                .get_json(url, &format!("searching for '{}' (page {})", query, page))
                .await;
            let works = match result {
                Ok(found) => found.works,
                Err(e) if ids.is_empty() => return Err(e),
                Err(e) => {
                    warn!("Search for '{}' stopped at page {}: {}", query, page, e);
                    break;
                }
            };

            let count = works.len();
            ids.extend(works.into_iter().filter_map(|w| w.id).map(|id| id.to_string()));
            debug!("Search page {} returned {} works", page, count);

            if count < SEARCH_PAGE_SIZE || ids.len() >= limit {
                break;
            }
            page += 1;
            tokio::time::sleep(self.page_delay).await;
        }

        ids.truncate(limit);
        info!("Search for '{}' found {} works", query, ids.len());
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogErrorKind;
    use crate::storage::test_server::{Route, TestServer};

    fn catalog(server: &TestServer) -> CatalogClient {
        CatalogClient::new(Client::builder().no_proxy().build().unwrap())
            .unwrap()
            .with_base_url(server.url("/"))
            .with_retry(RetryPolicy::new(3, Duration::from_millis(5)))
            .with_page_delay(Duration::ZERO)
    }

    fn json_route(value: serde_json::Value) -> Route {
        Route::new(serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(None).is_ok());
        assert!(build_http_client(Some("http://127.0.0.1:8080")).is_ok());
        assert!(build_http_client(Some("not a proxy")).is_err());
    }

    #[tokio::test]
    async fn test_fetch_manifest() {
        let body = serde_json::json!([{"type": "audio", "title": "a.mp3", "mediaDownloadUrl": "https://h/a"}]);
        let server = TestServer::start(vec![("/api/tracks/123?v=2", json_route(body.clone()))]).await;

        let value = catalog(&server).fetch_manifest("123").await.unwrap();
        assert_eq!(value, body);
    }

    #[tokio::test]
    async fn test_fetch_metadata() {
        let body = serde_json::json!({
            "title": "Some Work",
            "mainCoverUrl": "https://h/cover.jpg",
            "circle": {"name": "Circle"},
            "dl_count": 10
        });
        let server = TestServer::start(vec![("/api/workInfo/5", json_route(body))]).await;

        let metadata = catalog(&server).fetch_metadata("5").await.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Some Work"));
        assert_eq!(metadata.cover_url.as_deref(), Some("https://h/cover.jpg"));
        assert_eq!(metadata.circle_name(), Some("Circle"));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = TestServer::start(vec![]).await;

        let err = catalog(&server).fetch_metadata("404").await.unwrap_err();
        assert_eq!(err.catalog_kind(), Some(CatalogErrorKind::NotFound));
        assert_eq!(server.total_requests(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_is_retried() {
        let mut route = json_route(serde_json::json!({"title": "Back"}));
        route.fail_first = 2;
        let server = TestServer::start(vec![("/api/workInfo/7", route)]).await;

        let metadata = catalog(&server).fetch_metadata("7").await.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Back"));
        assert_eq!(server.requests_for("/api/workInfo/7"), 3);
    }

    #[tokio::test]
    async fn test_unavailable_after_all_attempts() {
        let mut route = json_route(serde_json::json!({}));
        route.fail_first = 10;
        let server = TestServer::start(vec![("/api/workInfo/8", route)]).await;

        let err = catalog(&server).fetch_metadata("8").await.unwrap_err();
        assert_eq!(err.catalog_kind(), Some(CatalogErrorKind::Unavailable));
        assert_eq!(server.requests_for("/api/workInfo/8"), 3);
    }

    #[tokio::test]
    async fn test_search_pages_until_limit() {
        let page = |start: u64, count: u64| {
            let works: Vec<_> = (start..start + count).map(|id| serde_json::json!({"id": id})).collect();
            json_route(serde_json::json!({ "works": works }))
        };
        let server = TestServer::start(vec![
            ("/api/search?query=rain&page=1&size=50", page(1, 50)),
            ("/api/search?query=rain&page=2&size=50", page(51, 50)),
            ("/api/search?query=rain&page=3&size=50", page(101, 10)),
        ])
        .await;

        let ids = catalog(&server).search("rain", 60).await.unwrap();
        assert_eq!(ids.len(), 60);
        assert_eq!(ids[0], "1");
        assert_eq!(ids[59], "60");
        assert_eq!(server.requests_for("/api/search?query=rain&page=3&size=50"), 0);

        let ids = catalog(&server).search("rain", 500).await.unwrap();
        assert_eq!(ids.len(), 110);
    }
}
