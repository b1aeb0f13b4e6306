//! Fetch log entries - one row per HTTP attempt during a scan.

use chrono::{DateTime, Utc};

/// Where a fetched URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Homepage,
    Robots,
    Sitemap,
    CommonPath,
    Link,
    ContactPage,
    BrowserFallback,
}

impl FetchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchSource::Homepage => "homepage",
            FetchSource::Robots => "robots",
            FetchSource::Sitemap => "sitemap",
            FetchSource::CommonPath => "common-path",
            FetchSource::Link => "link",
            FetchSource::ContactPage => "contact-page",
            FetchSource::BrowserFallback => "browser-fallback",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "homepage" => Some(FetchSource::Homepage),
            "robots" => Some(FetchSource::Robots),
            "sitemap" => Some(FetchSource::Sitemap),
            "common-path" => Some(FetchSource::CommonPath),
            "link" => Some(FetchSource::Link),
            "contact-page" => Some(FetchSource::ContactPage),
            "browser-fallback" => Some(FetchSource::BrowserFallback),
            _ => None,
        }
    }

    /// Precedence when picking the fetch that proves a domain is active.
    ///
    /// Lower is stronger evidence. A homepage fetch outranks everything; a
    /// browser-fallback render is the weakest acceptable proof.
    pub fn recovery_priority(&self) -> u8 {
        match self {
            FetchSource::Homepage => 0,
            FetchSource::ContactPage => 1,
            FetchSource::CommonPath => 2,
            FetchSource::Sitemap => 3,
            FetchSource::Link => 4,
            FetchSource::Robots => 5,
            FetchSource::BrowserFallback => 6,
        }
    }
}

/// Record of a single HTTP attempt. Append-only; never mutated after insert.
#[derive(Debug, Clone)]
pub struct FetchLogEntry {
    pub id: Option<i64>,
    pub scan_id: String,
    pub url: String,
    pub source: FetchSource,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub duration_ms: u64,
    /// False when robots.txt disallowed the URL and it was skipped unfetched.
    pub robots_allowed: bool,
    pub fetched_at: DateTime<Utc>,
}

impl FetchLogEntry {
    pub fn new(scan_id: &str, url: &str, source: FetchSource) -> Self {
        Self {
            id: None,
            scan_id: scan_id.to_string(),
            url: url.to_string(),
            source,
            status_code: None,
            error: None,
            duration_ms: 0,
            robots_allowed: true,
            fetched_at: Utc::now(),
        }
    }

    /// Entry for a URL skipped because robots.txt disallows it.
    pub fn robots_denied(scan_id: &str, url: &str, source: FetchSource) -> Self {
        let mut entry = Self::new(scan_id, url, source);
        entry.robots_allowed = false;
        entry
    }

    /// True if the attempt returned a 2xx response.
    pub fn succeeded(&self) -> bool {
        matches!(self.status_code, Some(code) if (200..300).contains(&code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trip() {
        for s in [
            FetchSource::Homepage,
            FetchSource::Robots,
            FetchSource::Sitemap,
            FetchSource::CommonPath,
            FetchSource::Link,
            FetchSource::ContactPage,
            FetchSource::BrowserFallback,
        ] {
            assert_eq!(FetchSource::from_str(s.as_str()), Some(s));
        }
    }

    #[test]
    fn homepage_outranks_browser_fallback() {
        assert!(
            FetchSource::Homepage.recovery_priority()
                < FetchSource::BrowserFallback.recovery_priority()
        );
    }
}
