//! Policy page link discovery.

use std::collections::BTreeMap;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::json;
use url::Url;

use crate::models::{DataPoint, DataPointKey};

use super::{Analyzer, TaskContext, TaskError};

/// Policy kinds and the markers that identify them in link href/text.
const POLICY_KINDS: &[(&str, &[&str])] = &[
    ("privacy", &["privacy"]),
    ("terms", &["terms", "conditions", "tos"]),
    ("returns", &["return", "refund"]),
    ("shipping", &["shipping", "delivery"]),
    ("cookies", &["cookie"]),
];

/// Finds privacy/terms/returns/shipping/cookie policy links across the
/// crawled pages. Runs only for authorized domains.
pub struct PolicyLinksAnalyzer;

#[async_trait]
impl Analyzer for PolicyLinksAnalyzer {
    fn key(&self) -> DataPointKey {
        DataPointKey::PolicyLinks
    }

    fn name(&self) -> &'static str {
        "policy-links"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<Vec<DataPoint>, TaskError> {
        if ctx.pages.is_empty() {
            return Err(TaskError::NoContent("no crawled pages".to_string()));
        }

        let mut found: BTreeMap<&str, String> = BTreeMap::new();
        let mut sources = Vec::new();

        for page in ctx.pages.values() {
            let links = policy_links_in(&page.body, &page.final_url);
            if !links.is_empty() && !sources.contains(&page.url) {
                sources.push(page.url.clone());
            }
            for (kind, url) in links {
                found.entry(kind).or_insert(url);
            }
            if found.len() == POLICY_KINDS.len() {
                break;
            }
        }

        let mut payload = serde_json::Map::new();
        for (kind, _) in POLICY_KINDS {
            payload.insert(
                (*kind).to_string(),
                found.get(kind).cloned().map(Into::into).unwrap_or(json!(null)),
            );
        }
        payload.insert("found_count".to_string(), json!(found.len()));

        Ok(vec![DataPoint::new(
            DataPointKey::PolicyLinks,
            "Policy pages",
            serde_json::Value::Object(payload),
        )
        .with_sources(sources)])
    }
}

/// Extract policy links from one page, resolved to absolute URLs.
fn policy_links_in(html: &str, page_url: &str) -> Vec<(&'static str, String)> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let selector = Selector::parse("a[href]").expect("static selector");

    let document = Html::parse_document(html);
    let mut found = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let text = element.text().collect::<Vec<_>>().join(" ").to_lowercase();
        let href_lower = href.to_lowercase();

        for (kind, markers) in POLICY_KINDS {
            if markers
                .iter()
                .any(|m| href_lower.contains(m) || text.contains(m))
            {
                if let Ok(mut resolved) = base.join(href) {
                    resolved.set_fragment(None);
                    found.push((*kind, resolved.to_string()));
                }
                break;
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_policy_links() {
        let html = r#"<footer>
            <a href="/privacy-policy">Privacy Policy</a>
            <a href="/legal/terms">Terms of Service</a>
            <a href="/returns">Refunds</a>
            <a href="/pages/shipping-info">Delivery</a>
        </footer>"#;

        let links = policy_links_in(html, "https://example.com/");
        let kinds: Vec<&str> = links.iter().map(|(k, _)| *k).collect();
        assert!(kinds.contains(&"privacy"));
        assert!(kinds.contains(&"terms"));
        assert!(kinds.contains(&"returns"));
        assert!(kinds.contains(&"shipping"));
        assert!(links
            .iter()
            .any(|(k, url)| *k == "privacy" && url == "https://example.com/privacy-policy"));
    }

    #[test]
    fn matches_on_link_text_too() {
        let html = r#"<a href="/p/58812">Our privacy commitment</a>"#;
        let links = policy_links_in(html, "https://example.com/");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].0, "privacy");
    }

    #[test]
    fn no_links_no_matches() {
        assert!(policy_links_in("<p>plain text</p>", "https://example.com/").is_empty());
    }
}
