//! Authorized-domain crawl policy.

use chrono::{DateTime, Utc};

/// Crawl authorization and limits for one hostname.
///
/// Absence of a matching row means "not authorized": the pipeline then skips
/// deep crawling in favor of single-page extraction. That is a policy
/// outcome, not an error.
#[derive(Debug, Clone)]
pub struct AuthorizedDomain {
    pub hostname: String,
    /// Whether subdomains of `hostname` are covered by this entry.
    pub allow_subdomains: bool,
    pub respect_robots: bool,
    pub max_pages_per_scan: u32,
    pub crawl_delay_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl AuthorizedDomain {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            allow_subdomains: false,
            respect_robots: true,
            max_pages_per_scan: 25,
            crawl_delay_ms: 500,
            created_at: Utc::now(),
        }
    }

    /// Check whether this entry covers `hostname`.
    pub fn covers(&self, hostname: &str) -> bool {
        if self.hostname == hostname {
            return true;
        }
        self.allow_subdomains && hostname.ends_with(&format!(".{}", self.hostname))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_always_covers() {
        let auth = AuthorizedDomain::new("example.com");
        assert!(auth.covers("example.com"));
        assert!(!auth.covers("shop.example.com"));
    }

    #[test]
    fn subdomain_match_requires_flag() {
        let mut auth = AuthorizedDomain::new("example.com");
        auth.allow_subdomains = true;
        assert!(auth.covers("shop.example.com"));
        assert!(auth.covers("a.b.example.com"));
        // Suffix match must respect label boundaries.
        assert!(!auth.covers("notexample.com"));
    }
}
