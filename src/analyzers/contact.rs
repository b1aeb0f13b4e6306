//! Contact details extraction.

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::json;
use tracing::debug;

use crate::models::{DataPoint, DataPointKey, FetchSource};

use super::{Analyzer, TaskContext, TaskError};

/// URL markers for pages likely to carry contact data.
const CONTACT_MARKERS: &[&str] = &["contact", "about", "impressum", "support"];

const MAX_RESULTS: usize = 20;

/// Extracts emails, phone numbers, social links, and address hints.
///
/// Prefers contact-like crawled pages; falls back to a direct fetch of the
/// target URL when the crawl produced nothing (the unauthorized path).
pub struct ContactAnalyzer;

#[async_trait]
impl Analyzer for ContactAnalyzer {
    fn key(&self) -> DataPointKey {
        DataPointKey::ContactDetails
    }

    fn name(&self) -> &'static str {
        "contact-details"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<Vec<DataPoint>, TaskError> {
        let mut documents: Vec<(String, String)> = Vec::new();

        let mut candidates = ctx.pages_matching(CONTACT_MARKERS);
        if candidates.is_empty() {
            // No contact-like page; fall back to whatever the crawl has,
            // homepage included.
            candidates = ctx.pages.values().collect();
        }
        for page in candidates {
            documents.push((page.url.clone(), page.body.clone()));
        }

        if documents.is_empty() {
            // Unauthorized or empty crawl: single-page fallback fetch.
            debug!(url = %ctx.url, "no crawled pages, fetching target directly");
            let page = ctx.client.fetch(&ctx.url, FetchSource::ContactPage).await?;
            if !page.is_success() {
                return Err(TaskError::NoContent(format!(
                    "target returned {}",
                    page.status
                )));
            }
            documents.push((page.url.clone(), page.body));
        }

        let mut details = ContactDetails::default();
        for (_, body) in &documents {
            details.collect(body);
        }
        details.finish();

        let sources: Vec<String> = documents.iter().map(|(url, _)| url.clone()).collect();
        let payload = json!({
            "emails": details.emails,
            "phones": details.phones,
            "social_links": details.social_links,
            "addresses": details.addresses,
            "pages_examined": sources.len(),
        });

        Ok(vec![DataPoint::new(
            DataPointKey::ContactDetails,
            "Contact details",
            payload,
        )
        .with_sources(sources)])
    }
}

#[derive(Default)]
struct ContactDetails {
    emails: Vec<String>,
    phones: Vec<String>,
    social_links: Vec<String>,
    addresses: Vec<String>,
}

impl ContactDetails {
    fn collect(&mut self, html: &str) {
        self.emails.extend(extract_emails(html));
        self.phones.extend(extract_phones(html));
        self.social_links.extend(extract_social_links(html));
        self.addresses.extend(extract_address_blocks(html));
    }

    fn finish(&mut self) {
        for list in [
            &mut self.emails,
            &mut self.phones,
            &mut self.social_links,
            &mut self.addresses,
        ] {
            list.sort();
            list.dedup();
            list.truncate(MAX_RESULTS);
        }
    }
}

fn extract_emails(html: &str) -> Vec<String> {
    let plain = Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
        .expect("static regex");
    let obfuscated = Regex::new(
        r"(?i)\b([a-z0-9._-]+)\s*[\[(]\s*at\s*[\])]\s*([a-z0-9-]+)\s*[\[(]\s*dot\s*[\])]\s*([a-z]{2,})\b",
    )
    .expect("static regex");

    let mut emails: Vec<String> = plain
        .find_iter(html)
        .map(|m| m.as_str().to_lowercase())
        // Image filenames match the pattern ("logo@2x.png").
        .filter(|e| !e.ends_with(".png") && !e.ends_with(".jpg") && !e.ends_with(".gif"))
        .collect();

    for caps in obfuscated.captures_iter(html) {
        emails.push(format!("{}@{}.{}", &caps[1], &caps[2], &caps[3]).to_lowercase());
    }
    emails
}

fn extract_phones(html: &str) -> Vec<String> {
    // tel: links are the most reliable source.
    let tel = Regex::new(r#"tel:([+0-9][0-9\-().\s]{5,20})"#).expect("static regex");
    let visible = Regex::new(r"\+[0-9][0-9\s().-]{7,18}[0-9]").expect("static regex");

    let mut phones: Vec<String> = tel
        .captures_iter(html)
        .map(|c| c[1].trim().to_string())
        .collect();
    phones.extend(visible.find_iter(html).map(|m| m.as_str().trim().to_string()));
    phones
}

fn extract_social_links(html: &str) -> Vec<String> {
    let social = Regex::new(
        r#"https?://(?:www\.)?(?:facebook|instagram|twitter|x|linkedin|tiktok|youtube|pinterest)\.com/[A-Za-z0-9_./@-]+"#,
    )
    .expect("static regex");
    social
        .find_iter(html)
        .map(|m| m.as_str().trim_end_matches(['"', '\'', '/']).to_string())
        .collect()
}

fn extract_address_blocks(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("address") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|el| {
            el.text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_plain_and_obfuscated_emails() {
        let html = r#"Reach us at <a href="mailto:sales@example.com">sales@example.com</a>
            or support [at] example [dot] com."#;
        let emails = extract_emails(html);
        assert!(emails.contains(&"sales@example.com".to_string()));
        assert!(emails.contains(&"support@example.com".to_string()));
    }

    #[test]
    fn ignores_asset_filenames() {
        let emails = extract_emails(r#"<img src="logo@2x.png">"#);
        assert!(emails.is_empty());
    }

    #[test]
    fn finds_tel_links_and_international_numbers() {
        let html = r#"<a href="tel:+1-555-123-4567">Call</a> or +44 20 7946 0958"#;
        let phones = extract_phones(html);
        assert!(phones.iter().any(|p| p.contains("555-123-4567")));
        assert!(phones.iter().any(|p| p.contains("7946")));
    }

    #[test]
    fn finds_social_profiles() {
        let html = r#"<a href="https://www.instagram.com/exampleshop">IG</a>
            <a href="https://facebook.com/exampleshop/">FB</a>"#;
        let links = extract_social_links(html);
        assert_eq!(links.len(), 2);
        assert!(links[0].contains("instagram.com/exampleshop"));
    }

    #[test]
    fn reads_address_elements() {
        let html = "<address>1 Main St\n  Springfield</address>";
        let addrs = extract_address_blocks(html);
        assert_eq!(addrs, vec!["1 Main St Springfield"]);
    }
}
