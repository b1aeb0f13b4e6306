//! Homepage product (SKU) extraction.

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::json;

use crate::models::{DataPoint, DataPointKey};

use super::{Analyzer, TaskContext, TaskError};

const MAX_SAMPLES: usize = 10;

/// Summarizes product listings visible on the homepage.
///
/// Runs only for authorized domains; the harness skips it otherwise.
pub struct ProductsAnalyzer;

#[async_trait]
impl Analyzer for ProductsAnalyzer {
    fn key(&self) -> DataPointKey {
        DataPointKey::HomepageSkusSummary
    }

    fn name(&self) -> &'static str {
        "homepage-skus"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<Vec<DataPoint>, TaskError> {
        let homepage = ctx
            .pages
            .values()
            .find(|p| p.url.trim_end_matches('/') == ctx.url.trim_end_matches('/'))
            .or_else(|| ctx.pages.values().next());

        let Some(page) = homepage else {
            return Err(TaskError::NoContent("no homepage content".to_string()));
        };

        let summary = summarize_products(&page.body);
        let payload = json!({
            "sku_count": summary.count,
            "currencies": summary.currencies,
            "samples": summary
                .samples
                .iter()
                .map(|s| json!({"title": s.0, "price": s.1}))
                .collect::<Vec<_>>(),
        });

        Ok(vec![DataPoint::new(
            DataPointKey::HomepageSkusSummary,
            "Homepage product summary",
            payload,
        )
        .with_sources(vec![page.url.clone()])])
    }
}

struct ProductSummary {
    count: usize,
    currencies: Vec<String>,
    samples: Vec<(String, String)>,
}

/// Find price-bearing product cards in homepage HTML.
fn summarize_products(html: &str) -> ProductSummary {
    let price_re = Regex::new(r"(?:[$€£¥]\s?\d[\d,.]*|\d[\d,.]*\s?(?:USD|EUR|GBP|kr|zł))")
        .expect("static regex");

    let document = Html::parse_document(html);
    let card_selector = Selector::parse(
        r#"[class*="product"], [class*="item"], [data-product-id], article, li"#,
    )
    .expect("static selector");

    let mut count = 0usize;
    let mut samples = Vec::new();
    let mut currencies = Vec::new();

    for card in document.select(&card_selector) {
        let text = card.text().collect::<Vec<_>>().join(" ");
        let Some(price) = price_re.find(&text) else {
            continue;
        };
        // Nested containers both match; only count leaf-ish cards by
        // ignoring elements with a matching child of their own.
        let child_has_price = card
            .children()
            .filter_map(scraper::ElementRef::wrap)
            .any(|c| price_re.is_match(&c.text().collect::<Vec<_>>().join(" ")));
        if child_has_price && card.value().name() != "li" {
            continue;
        }

        count += 1;
        if let Some(symbol) = currency_of(price.as_str()) {
            if !currencies.contains(&symbol) {
                currencies.push(symbol);
            }
        }
        if samples.len() < MAX_SAMPLES {
            let title = card_title(&card).unwrap_or_else(|| "unnamed".to_string());
            samples.push((title, price.as_str().trim().to_string()));
        }
    }

    ProductSummary {
        count,
        currencies,
        samples,
    }
}

fn currency_of(price: &str) -> Option<String> {
    for (token, code) in [
        ("$", "USD"),
        ("€", "EUR"),
        ("£", "GBP"),
        ("¥", "JPY"),
        ("USD", "USD"),
        ("EUR", "EUR"),
        ("GBP", "GBP"),
    ] {
        if price.contains(token) {
            return Some(code.to_string());
        }
    }
    None
}

fn card_title(card: &scraper::ElementRef) -> Option<String> {
    let heading = Selector::parse(r#"h1, h2, h3, h4, [class*="title"], [class*="name"]"#)
        .expect("static selector");
    let title = card
        .select(&heading)
        .next()?
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP_HTML: &str = r#"<html><body>
      <ul class="product-grid">
        <li class="product"><h3 class="title">Blue Widget</h3><span class="price">$19.99</span></li>
        <li class="product"><h3 class="title">Red Widget</h3><span class="price">$24.50</span></li>
        <li class="product"><h3 class="title">Gadget Pro</h3><span class="price">€99</span></li>
      </ul>
      <div class="banner">Free shipping over $50</div>
    </body></html>"#;

    #[test]
    fn counts_product_cards_with_prices() {
        let summary = summarize_products(SHOP_HTML);
        assert!(summary.count >= 3);
        assert!(summary.currencies.contains(&"USD".to_string()));
        assert!(summary.currencies.contains(&"EUR".to_string()));
    }

    #[test]
    fn captures_titles_with_prices() {
        let summary = summarize_products(SHOP_HTML);
        assert!(summary
            .samples
            .iter()
            .any(|(title, price)| title == "Blue Widget" && price == "$19.99"));
    }

    #[test]
    fn empty_page_yields_zero() {
        let summary = summarize_products("<html><body><p>hello</p></body></html>");
        assert_eq!(summary.count, 0);
        assert!(summary.samples.is_empty());
    }
}
