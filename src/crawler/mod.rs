//! Discovery crawler.
//!
//! Produces a bounded map of fetched pages plus a complete fetch log,
//! honoring the authorization policy's page budget, crawl delay, and robots
//! rules. Individual fetch failures never abort the crawl; the only error
//! this module raises is failing to start discovery at all.

pub mod robots;
pub mod sitemap;

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use chrono::Utc;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::fetch::{BrowserConfig, BrowserFetcher, HttpClient};
use crate::models::{AuthorizedDomain, FetchLogEntry, FetchSource};

pub use robots::RobotsRules;

/// Paths worth probing even when no sitemap or link mentions them.
const COMMON_PATHS: &[(&str, FetchSource)] = &[
    ("/contact", FetchSource::ContactPage),
    ("/contact-us", FetchSource::ContactPage),
    ("/about", FetchSource::ContactPage),
    ("/about-us", FetchSource::ContactPage),
    ("/privacy", FetchSource::CommonPath),
    ("/privacy-policy", FetchSource::CommonPath),
    ("/terms", FetchSource::CommonPath),
    ("/terms-of-service", FetchSource::CommonPath),
    ("/returns", FetchSource::CommonPath),
    ("/refund-policy", FetchSource::CommonPath),
    ("/shipping", FetchSource::CommonPath),
    ("/faq", FetchSource::CommonPath),
];

/// File extensions that are never HTML pages.
const SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".css", ".js", ".zip",
    ".gz", ".mp4", ".mp3", ".woff", ".woff2", ".ttf", ".xml", ".json",
];

/// Discovery failed before any crawling could happen.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid target url: {0}")]
    InvalidUrl(String),
    #[error("discovery could not start: {0}")]
    DiscoveryStart(String),
}

/// One successfully fetched page.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub body: String,
    pub source: FetchSource,
}

/// Result of a discovery crawl.
#[derive(Debug)]
pub struct CrawlOutcome {
    /// Fetched pages keyed by requested URL. May be empty; an authorized
    /// site with nothing reachable is a valid outcome.
    pub pages: BTreeMap<String, PageContent>,
    pub robots: RobotsRules,
    /// Key of the homepage in `pages`, when it was fetched (by either path).
    homepage_key: Option<String>,
}

impl CrawlOutcome {
    /// The homepage page, if it was fetched.
    pub fn homepage(&self) -> Option<&PageContent> {
        self.homepage_key.as_ref().and_then(|k| self.pages.get(k))
    }
}

/// Bounded, policy-driven site crawler.
pub struct Crawler {
    client: HttpClient,
    browser_config: BrowserConfig,
    policy: AuthorizedDomain,
    base: Url,
    user_agent_token: String,
}

impl Crawler {
    /// Create a crawler for a target URL under a resolved policy.
    pub fn new(
        client: HttpClient,
        browser_config: BrowserConfig,
        policy: AuthorizedDomain,
        target_url: &str,
    ) -> Result<Self, CrawlError> {
        let base = Url::parse(target_url).map_err(|e| CrawlError::InvalidUrl(e.to_string()))?;
        if base.host_str().is_none() {
            return Err(CrawlError::InvalidUrl(format!("no host in {target_url}")));
        }
        Ok(Self {
            client,
            browser_config,
            policy,
            base,
            user_agent_token: "siteintel".to_string(),
        })
    }

    /// Run the crawl.
    pub async fn crawl(&self) -> Result<CrawlOutcome, CrawlError> {
        let origin = self.origin()?;

        // Phase 1: robots.txt. Must settle before any page fetch.
        let robots = if self.policy.respect_robots {
            self.fetch_robots(&origin).await
        } else {
            RobotsRules::allow_all()
        };

        // Phase 2: sitemap enumeration.
        let sitemap_urls =
            sitemap::discover_sitemap_urls(&self.client, &origin, robots.sitemaps()).await;

        // Phase 3: seed the candidate queue. Homepage first so link
        // discovery can extend the queue early.
        let mut queue: VecDeque<(String, FetchSource)> = VecDeque::new();
        queue.push_back((self.base.to_string(), FetchSource::Homepage));
        for (path, source) in COMMON_PATHS {
            queue.push_back((format!("{origin}{path}"), *source));
        }
        for url in sitemap_urls {
            queue.push_back((url, FetchSource::Sitemap));
        }

        // Phase 4: bounded fetch loop.
        let delay = self.effective_delay(&robots);
        let budget = self.policy.max_pages_per_scan as usize;
        let mut seen: HashSet<String> = HashSet::new();
        let mut pages: BTreeMap<String, PageContent> = BTreeMap::new();
        let mut homepage_key = None;
        let mut attempts = 0usize;
        let mut browser: Option<BrowserFetcher> = None;

        while let Some((url, source)) = queue.pop_front() {
            if attempts >= budget {
                debug!("page budget of {} exhausted", budget);
                break;
            }
            let Some(normalized) = self.normalize_candidate(&url) else {
                continue;
            };
            if !seen.insert(normalized.clone()) {
                continue;
            }

            if self.policy.respect_robots {
                let path = Url::parse(&normalized)
                    .map(|u| u.path().to_string())
                    .unwrap_or_else(|_| "/".to_string());
                if !robots.is_allowed(&path) {
                    debug!(url = %normalized, "robots.txt disallows, skipping");
                    self.client.log_robots_denied(&normalized, source).await;
                    continue;
                }
            }

            if attempts > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempts += 1;

            match self.fetch_candidate(&normalized, source, &mut browser).await {
                Some(page) => {
                    if source == FetchSource::Homepage {
                        homepage_key = Some(normalized.clone());
                        for link in extract_links(&page.body, &page.final_url) {
                            queue.push_back((link, FetchSource::Link));
                        }
                    }
                    pages.insert(normalized, page);
                }
                None => {
                    // Already logged; move on with the rest of the queue.
                }
            }
        }

        if let Some(mut b) = browser {
            b.close().await;
        }

        info!(
            pages = pages.len(),
            attempts, "crawl finished for {}", self.policy.hostname
        );
        Ok(CrawlOutcome {
            pages,
            robots,
            homepage_key,
        })
    }

    fn origin(&self) -> Result<String, CrawlError> {
        let host = self
            .base
            .host_str()
            .ok_or_else(|| CrawlError::DiscoveryStart("missing host".to_string()))?;
        let scheme = self.base.scheme();
        Ok(match self.base.port() {
            Some(port) => format!("{scheme}://{host}:{port}"),
            None => format!("{scheme}://{host}"),
        })
    }

    async fn fetch_robots(&self, origin: &str) -> RobotsRules {
        let robots_url = format!("{origin}/robots.txt");
        match self.client.fetch(&robots_url, FetchSource::Robots).await {
            Ok(page) if page.is_success() => {
                RobotsRules::parse(&page.body, &self.user_agent_token)
            }
            Ok(page) => {
                debug!("robots.txt returned {}, treating as allow-all", page.status);
                RobotsRules::allow_all()
            }
            Err(e) => {
                debug!("robots.txt fetch failed ({}), treating as allow-all", e);
                RobotsRules::allow_all()
            }
        }
    }

    /// The crawler's own pacing: the larger of the policy delay and any
    /// robots crawl-delay directive.
    fn effective_delay(&self, robots: &RobotsRules) -> Duration {
        let policy = Duration::from_millis(self.policy.crawl_delay_ms);
        let directive = robots
            .crawl_delay_secs()
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::ZERO);
        policy.max(directive)
    }

    /// Keep a candidate only if it stays on the authorized site and does not
    /// point at a binary asset. Fragments are dropped so equivalent URLs
    /// dedupe.
    fn normalize_candidate(&self, candidate: &str) -> Option<String> {
        let mut parsed = Url::parse(candidate).ok()?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return None;
        }
        let host = parsed.host_str()?.to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        if !self.policy.covers(host) {
            return None;
        }
        let path = parsed.path().to_lowercase();
        if SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            return None;
        }
        parsed.set_fragment(None);
        Some(parsed.to_string())
    }

    /// Fetch one candidate, falling back to the browser once on failure.
    async fn fetch_candidate(
        &self,
        url: &str,
        source: FetchSource,
        browser: &mut Option<BrowserFetcher>,
    ) -> Option<PageContent> {
        match self.client.fetch(url, source).await {
            Ok(page) if page.is_success() => {
                return Some(PageContent {
                    url: url.to_string(),
                    final_url: page.final_url,
                    status: page.status.as_u16(),
                    body: page.body,
                    source,
                });
            }
            Ok(page) if needs_browser_retry(page.status.as_u16()) => {
                debug!(url, status = page.status.as_u16(), "retrying via browser");
            }
            Ok(page) => {
                debug!(url, status = page.status.as_u16(), "skipping non-success page");
                return None;
            }
            Err(e) => {
                debug!(url, error = %e, "plain fetch failed, retrying via browser");
            }
        }

        self.fetch_via_browser(url, browser).await
    }

    async fn fetch_via_browser(
        &self,
        url: &str,
        browser: &mut Option<BrowserFetcher>,
    ) -> Option<PageContent> {
        let fetcher =
            browser.get_or_insert_with(|| BrowserFetcher::new(self.browser_config.clone()));

        let mut entry =
            FetchLogEntry::new(self.client.scan_id(), url, FetchSource::BrowserFallback);
        let start = Instant::now();
        let result = fetcher.fetch(url).await;
        entry.duration_ms = start.elapsed().as_millis() as u64;
        entry.fetched_at = Utc::now();

        match result {
            Ok(page) => {
                entry.status_code = Some(200);
                self.client.log_external_attempt(&entry).await;
                Some(PageContent {
                    url: url.to_string(),
                    final_url: page.final_url,
                    status: 200,
                    body: page.content,
                    source: FetchSource::BrowserFallback,
                })
            }
            Err(e) => {
                warn!(url, error = %e, "browser fallback failed");
                entry.error = Some(e.to_string());
                self.client.log_external_attempt(&entry).await;
                None
            }
        }
    }
}

/// Whether a status suggests bot protection worth a browser retry.
fn needs_browser_retry(status: u16) -> bool {
    matches!(status, 403 | 429 | 503)
}

/// Extract same-document links from HTML, resolved against the page URL.
fn extract_links(html: &str, page_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let document = Html::parse_document(html);
    let mut links = Vec::new();
    let mut seen = HashSet::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }
        let Ok(mut resolved) = base.join(href) else {
            continue;
        };
        resolved.set_fragment(None);
        let resolved = resolved.to_string();
        if seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_links_resolves_relative() {
        let html = r##"<html><body>
            <a href="/products">Products</a>
            <a href="contact">Contact</a>
            <a href="https://other.example/x">External</a>
            <a href="#section">Anchor</a>
            <a href="javascript:void(0)">JS</a>
        </body></html>"##;

        let links = extract_links(html, "https://example.com/");
        assert!(links.contains(&"https://example.com/products".to_string()));
        assert!(links.contains(&"https://example.com/contact".to_string()));
        assert!(links.contains(&"https://other.example/x".to_string()));
        assert_eq!(links.len(), 3);
    }

    #[test]
    fn browser_retry_statuses() {
        assert!(needs_browser_retry(403));
        assert!(needs_browser_retry(503));
        assert!(!needs_browser_retry(404));
        assert!(!needs_browser_retry(200));
    }
}
