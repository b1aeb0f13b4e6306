//! Domain entity and hostname normalization.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// A scanned website domain.
///
/// Identity is the hex SHA-256 of the normalized hostname, so repeated scan
/// requests for the same site converge on one row.
#[derive(Debug, Clone)]
pub struct Domain {
    pub id: String,
    pub hostname: String,
    /// Last-known reachability.
    pub is_active: bool,
    pub status_code: Option<u16>,
    /// Manual risk override set by an operator; the pipeline never writes it.
    pub manual_risk: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Domain {
    /// Create a domain for a normalized hostname.
    pub fn new(hostname: &str) -> Self {
        let now = Utc::now();
        Self {
            id: domain_id(hostname),
            hostname: hostname.to_string(),
            is_active: false,
            status_code: None,
            manual_risk: None,
            last_checked_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Compute the stable identifier for a normalized hostname.
pub fn domain_id(hostname: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(hostname.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalize a user-supplied target into a bare hostname.
///
/// Accepts full URLs or bare hosts. Lowercases, strips the scheme, path,
/// port, trailing dot, and a single leading `www.` label.
pub fn normalize_hostname(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let host = if trimmed.contains("://") {
        url::Url::parse(trimmed).ok()?.host_str()?.to_string()
    } else {
        // Bare host, possibly with path or port attached.
        let candidate = format!("https://{trimmed}");
        url::Url::parse(&candidate).ok()?.host_str()?.to_string()
    };

    let host = host.to_lowercase();
    let host = host.trim_end_matches('.');
    let host = host.strip_prefix("www.").unwrap_or(host);

    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_urls_and_bare_hosts() {
        assert_eq!(
            normalize_hostname("https://www.Example.COM/shop?x=1"),
            Some("example.com".to_string())
        );
        assert_eq!(
            normalize_hostname("example.com/path"),
            Some("example.com".to_string())
        );
        assert_eq!(
            normalize_hostname("shop.example.com."),
            Some("shop.example.com".to_string())
        );
        assert_eq!(normalize_hostname(""), None);
    }

    #[test]
    fn same_hostname_same_id() {
        let a = Domain::new("example.com");
        let b = Domain::new("example.com");
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 64);
    }
}
