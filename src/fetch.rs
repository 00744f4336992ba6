use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::cache::PageCache;

const FETCH_TIMEOUT_SECS: u64 = 300;
const USER_AGENT: &str = "Mozilla/5.0";

/// The sole network boundary: GET a URL with the identifying header and a
/// fixed timeout, backed by the on-disk page cache.
///
/// A per-URL single-flight guard ensures at most one in-flight network fetch
/// per URL; concurrent callers for the same URL wait on the guard and then
/// read the freshly written cache entry. There is no retry layer: transport
/// errors and non-2xx statuses surface to the caller, which degrades the
/// surrounding day or item instead of aborting the run.
pub struct Fetcher {
    client: reqwest::Client,
    cache: PageCache,
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Fetcher {
    pub fn new(cache: PageCache) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            cache,
            inflight: Mutex::new(HashMap::new()),
        })
    }

    /// Page body for `url`: cache hit, or one network fetch that populates
    /// the cache.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        if let Some(body) = self.cache.get(url) {
            return Ok(body);
        }

        let guard = self.inflight_guard(url);
        let _held = guard.lock().await;

        // Another caller may have fetched while we waited on the guard.
        let result = match self.cache.get(url) {
            Some(body) => Ok(body),
            None => self.fetch_and_store(url).await,
        };

        // Entry removal must run on success and on every error path, or the
        // map keeps one entry per failing URL for the life of the run.
        self.release_guard(url);
        result
    }

    async fn fetch_and_store(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed for {}", url))?;
        let response = response
            .error_for_status()
            .with_context(|| format!("Non-success status for {}", url))?;
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;

        self.cache.put(url, &body)?;
        Ok(body)
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    fn inflight_guard(&self, url: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inflight.lock().expect("inflight map poisoned");
        map.entry(url.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release_guard(&self, url: &str) {
        let mut map = self.inflight.lock().expect("inflight map poisoned");
        map.remove(url);
    }
}

// ── Tests ──
