//! Browser-based fetcher for bot-protected or TLS-broken sites.
//!
//! Uses chromiumoxide (CDP) as a second-chance fetch path when the plain
//! HTTP client fails. Compiled to a stub when the `browser` feature is off.

use serde::{Deserialize, Serialize};

#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use anyhow::Context;
use anyhow::Result;

#[cfg(feature = "browser")]
use chromiumoxide::Browser;
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Page load timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

fn default_headless() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            timeout: default_timeout(),
            chrome_args: Vec::new(),
        }
    }
}

/// Rendered page from the browser.
#[derive(Debug, Clone)]
pub struct BrowserPage {
    pub url: String,
    pub final_url: String,
    pub content: String,
}

/// Browser-based fetcher.
#[cfg(feature = "browser")]
pub struct BrowserFetcher {
    config: BrowserConfig,
    browser: Option<Browser>,
}

#[cfg(feature = "browser")]
impl BrowserFetcher {
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/opt/google/chrome/chrome",
    ];

    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            browser: None,
        }
    }

    /// Find a Chrome/Chromium executable.
    fn find_chrome() -> Result<std::path::PathBuf> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        debug!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found; install chromium or disable the browser fallback"
        ))
    }

    /// Launch the browser if not already running.
    pub async fn ensure_browser(&mut self) -> Result<()> {
        if self.browser.is_some() {
            return Ok(());
        }

        info!("Launching browser (headless={})", self.config.headless);
        let chrome_path = Self::find_chrome()?;

        let mut builder =
            chromiumoxide::BrowserConfig::builder().chrome_executable(chrome_path);
        if !self.config.headless {
            builder = builder.with_head();
        }
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--no-sandbox")
            .arg("--disable-gpu");
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("browser config: {e}"))?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch browser")?;

        // Drive the CDP event loop until the browser goes away.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        self.browser = Some(browser);
        Ok(())
    }

    /// Fetch a page through the browser, returning rendered HTML.
    pub async fn fetch(&mut self, url: &str) -> Result<BrowserPage> {
        self.ensure_browser().await?;
        let browser = self.browser.as_ref().ok_or_else(|| {
            anyhow::anyhow!("browser not available")
        })?;

        let page = browser.new_page(url).await.context("navigation failed")?;

        // Wait for the document to settle before reading content.
        let wait = Duration::from_secs(self.config.timeout);
        let ready = tokio::time::timeout(wait, page.wait_for_navigation()).await;
        if ready.is_err() {
            warn!(url, "timeout waiting for page load");
        }

        let content = page
            .content()
            .await
            .context("failed to read page content")?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        let _ = page.close().await;

        Ok(BrowserPage {
            url: url.to_string(),
            final_url,
            content,
        })
    }

    /// Shut the browser down.
    pub async fn close(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            let _ = browser.close().await;
            let _ = browser.wait().await;
        }
    }
}

/// Stub fetcher when the browser feature is disabled.
#[cfg(not(feature = "browser"))]
pub struct BrowserFetcher {
    _config: BrowserConfig,
}

#[cfg(not(feature = "browser"))]
impl BrowserFetcher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { _config: config }
    }

    pub async fn fetch(&mut self, _url: &str) -> Result<BrowserPage> {
        Err(anyhow::anyhow!(
            "browser support not compiled in (enable the 'browser' feature)"
        ))
    }

    pub async fn close(&mut self) {}
}
