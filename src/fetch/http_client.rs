//! HTTP client with per-attempt fetch logging.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::models::{FetchLogEntry, FetchSource};
use crate::repository::FetchLogRepository;

use super::user_agent::resolve_user_agent;

/// Transport-level fetch failure. A non-2xx response is not an error; the
/// status travels on the returned page instead.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Result of one page fetch.
#[derive(Debug, Clone)]
pub struct PageFetch {
    /// URL as requested.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub duration: Duration,
}

impl PageFetch {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }
}

/// HTTP client that records exactly one fetch-log row per attempt.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    fetch_log: Option<FetchLogRepository>,
    scan_id: String,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Self::with_user_agent(timeout, None)
    }

    /// Create a new HTTP client with custom user agent configuration.
    pub fn with_user_agent(
        timeout: Duration,
        user_agent_config: Option<&str>,
    ) -> Result<Self, FetchError> {
        let user_agent = resolve_user_agent(user_agent_config);
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            fetch_log: None,
            scan_id: String::new(),
        })
    }

    /// Attach the fetch log for a scan. Every attempt from here on is logged
    /// under that scan.
    pub fn with_fetch_log(mut self, repo: FetchLogRepository, scan_id: &str) -> Self {
        self.fetch_log = Some(repo);
        self.scan_id = scan_id.to_string();
        self
    }

    /// Access the underlying reqwest client (for probes needing custom
    /// redirect or TLS settings).
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// The scan this client logs attempts under.
    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    /// Fetch one page, logging the attempt win or lose.
    pub async fn fetch(&self, url: &str, source: FetchSource) -> Result<PageFetch, FetchError> {
        let mut entry = FetchLogEntry::new(&self.scan_id, url, source);
        let start = Instant::now();

        let result = self.fetch_inner(url).await;
        let duration = start.elapsed();
        entry.duration_ms = duration.as_millis() as u64;

        match &result {
            Ok(page) => {
                entry.status_code = Some(page.status.as_u16());
                debug!(url, status = page.status.as_u16(), "fetched page");
            }
            Err(e) => {
                entry.error = Some(e.to_string());
                debug!(url, error = %e, "fetch failed");
            }
        }

        self.log_attempt(&entry).await;
        result
    }

    async fn fetch_inner(&self, url: &str) -> Result<PageFetch, FetchError> {
        let start = Instant::now();
        let response = self.client.get(url).send().await?;

        let status = response.status();
        let final_url = response.url().to_string();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }

        let body = response.text().await.unwrap_or_default();

        Ok(PageFetch {
            url: url.to_string(),
            final_url,
            status,
            headers,
            body,
            duration: start.elapsed(),
        })
    }

    /// Record a log entry for an attempt made outside this client (the
    /// browser fallback path), keeping the one-row-per-attempt guarantee.
    pub async fn log_external_attempt(&self, entry: &FetchLogEntry) {
        self.log_attempt(entry).await;
    }

    /// Record that a URL was skipped because robots.txt disallows it.
    pub async fn log_robots_denied(&self, url: &str, source: FetchSource) {
        let entry = FetchLogEntry::robots_denied(&self.scan_id, url, source);
        self.log_attempt(&entry).await;
    }

    async fn log_attempt(&self, entry: &FetchLogEntry) {
        if let Some(repo) = &self.fetch_log {
            if let Err(e) = repo.append(entry).await {
                debug!(error = %e, "failed to record fetch log entry");
            }
        }
    }
}
