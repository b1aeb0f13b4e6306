//! Sitemap discovery.
//!
//! Fetches sitemap XML from robots.txt directives and standard locations,
//! expanding sitemap indexes iteratively. Sitemaps use XML namespaces that
//! HTML parsers handle poorly, so `<loc>` values are extracted with simple
//! string parsing.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::fetch::HttpClient;
use crate::models::FetchSource;

/// Standard sitemap locations to check when robots.txt declares none.
const SITEMAP_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemap/sitemap.xml",
    "/sitemaps/sitemap.xml",
];

/// Cap on sitemap documents fetched per scan.
const MAX_SITEMAPS: usize = 20;

/// Cap on URLs taken from sitemaps per scan.
const MAX_SITEMAP_URLS: usize = 500;

/// Collect page URLs from the site's sitemap(s).
///
/// Failures are logged and tolerated; an unreachable or malformed sitemap
/// simply contributes no URLs.
pub async fn discover_sitemap_urls(
    client: &HttpClient,
    base_url: &str,
    declared: &[String],
) -> Vec<String> {
    let base = base_url.trim_end_matches('/');

    let mut pending: Vec<String> = declared.to_vec();
    if pending.is_empty() {
        for path in SITEMAP_PATHS {
            pending.push(format!("{base}{path}"));
        }
    }

    let mut processed = HashSet::new();
    let mut urls = Vec::new();

    while let Some(sitemap_url) = pending.pop() {
        if urls.len() >= MAX_SITEMAP_URLS {
            break;
        }
        if !processed.insert(sitemap_url.clone()) || processed.len() > MAX_SITEMAPS {
            continue;
        }

        debug!("Fetching sitemap: {}", sitemap_url);
        let page = match client.fetch(&sitemap_url, FetchSource::Sitemap).await {
            Ok(p) if p.is_success() => p,
            Ok(p) => {
                debug!("Sitemap {} returned {}", sitemap_url, p.status);
                continue;
            }
            Err(e) => {
                warn!("Failed to fetch sitemap {}: {}", sitemap_url, e);
                continue;
            }
        };

        if page.body.contains("<sitemapindex") {
            for loc in extract_locs(&page.body) {
                if !processed.contains(&loc) {
                    pending.push(loc);
                }
            }
        } else {
            urls.extend(extract_locs(&page.body));
        }
    }

    urls.sort();
    urls.dedup();
    urls.truncate(MAX_SITEMAP_URLS);
    debug!("Sitemap discovery found {} URLs", urls.len());
    urls
}

/// Extract `<loc>` values from sitemap XML.
fn extract_locs(xml: &str) -> Vec<String> {
    let mut locs = Vec::new();
    for line in xml.lines() {
        let mut rest = line;
        while let Some(start) = rest.find("<loc>") {
            let after = &rest[start + 5..];
            let Some(end) = after.find("</loc>") else {
                break;
            };
            let url = &after[..end];
            let url = url
                .replace("&amp;", "&")
                .replace("&lt;", "<")
                .replace("&gt;", ">")
                .replace("&quot;", "\"")
                .replace("&apos;", "'");
            locs.push(url.trim().to_string());
            rest = &after[end + 6..];
        }
    }
    locs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_urls_from_simple_sitemap() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://example.com/products/widget</loc>
  </url>
  <url>
    <loc>https://example.com/contact</loc>
  </url>
</urlset>"#;

        let urls = extract_locs(xml);
        assert_eq!(urls.len(), 2);
        assert!(urls.contains(&"https://example.com/products/widget".to_string()));
    }

    #[test]
    fn extract_urls_with_xml_entities() {
        let xml = r#"<urlset>
  <url><loc>https://example.com/search?q=test&amp;page=1</loc></url>
</urlset>"#;

        let urls = extract_locs(xml);
        assert_eq!(urls, vec!["https://example.com/search?q=test&page=1"]);
    }

    #[test]
    fn extract_multiple_locs_on_one_line() {
        let xml = "<urlset><url><loc>https://a.example/x</loc></url><url><loc>https://a.example/y</loc></url></urlset>";
        assert_eq!(extract_locs(xml).len(), 2);
    }
}
