//! Redirect chain signal group.

use std::time::Duration;

use regex::Regex;
use serde_json::json;
use url::Url;

use crate::analyzers::TaskError;
use crate::models::{Severity, Signal};

const CATEGORY: &str = "redirects";
const MAX_HOPS: usize = 10;

/// Walk the redirect chain from `start_url` manually and report on it.
pub async fn collect(start_url: &str, timeout: Duration) -> Result<Vec<Signal>, TaskError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| TaskError::Other(anyhow::anyhow!("redirect probe client: {e}")))?;

    let start = Url::parse(start_url)
        .map_err(|e| TaskError::Other(anyhow::anyhow!("bad start url: {e}")))?;
    let start_host = start.host_str().unwrap_or_default().to_string();

    let mut current = start.clone();
    let mut hops = 0usize;
    let mut cross_domain = false;
    let mut final_body = String::new();

    loop {
        let response = client
            .get(current.as_str())
            .send()
            .await
            .map_err(|e| TaskError::Other(anyhow::anyhow!("redirect walk: {e}")))?;

        if response.status().is_redirection() && hops < MAX_HOPS {
            let Some(location) = response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok())
            else {
                break;
            };
            let Ok(next) = current.join(location) else {
                break;
            };
            if let Some(host) = next.host_str() {
                if !same_site(&start_host, host) {
                    cross_domain = true;
                }
            }
            current = next;
            hops += 1;
            continue;
        }

        final_body = response.text().await.unwrap_or_default();
        break;
    }

    let meta_refresh = Regex::new(r#"(?i)<meta[^>]+http-equiv\s*=\s*["']?refresh"#)
        .expect("static regex")
        .is_match(&final_body);
    let js_redirect = Regex::new(
        r#"(?i)(window\.location|location\.href|location\.replace|document\.location)\s*[=(]"#,
    )
    .expect("static regex")
    .is_match(&final_body);

    let mut signals = vec![
        Signal::new(CATEGORY, "redirect_count", json!(hops)),
        Signal::new(CATEGORY, "final_url", json!(current.to_string())),
    ];
    signals.push(
        Signal::new(CATEGORY, "cross_domain_redirect", json!(cross_domain)).with_severity(
            if cross_domain {
                Severity::Warning
            } else {
                Severity::Info
            },
        ),
    );
    signals.push(
        Signal::new(CATEGORY, "meta_refresh", json!(meta_refresh)).with_severity(
            if meta_refresh {
                Severity::Notice
            } else {
                Severity::Info
            },
        ),
    );
    signals.push(
        Signal::new(CATEGORY, "js_redirect", json!(js_redirect)).with_severity(if js_redirect {
            Severity::Notice
        } else {
            Severity::Info
        }),
    );

    Ok(signals)
}

/// Hosts count as the same site when equal modulo a `www.` prefix.
fn same_site(origin_host: &str, other_host: &str) -> bool {
    let a = origin_host.strip_prefix("www.").unwrap_or(origin_host);
    let b = other_host.strip_prefix("www.").unwrap_or(other_host);
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn www_prefix_is_same_site() {
        assert!(same_site("example.com", "www.example.com"));
        assert!(same_site("www.example.com", "example.com"));
        assert!(!same_site("example.com", "evil.example.net"));
    }
}
