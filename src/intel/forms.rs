//! Form and input inventory signal group.

use scraper::{Html, Selector};
use serde_json::json;
use url::Url;

use crate::analyzers::{TaskContext, TaskError};
use crate::fetch::PageFetch;
use crate::models::{Severity, Signal};

const CATEGORY: &str = "forms";

#[derive(Default)]
struct FormInventory {
    form_count: usize,
    password_inputs: usize,
    email_inputs: usize,
    payment_inputs: usize,
    external_actions: Vec<String>,
}

/// Inventory forms across the crawled pages (or the probe body when the
/// crawl produced nothing).
pub fn collect(
    ctx: &TaskContext,
    probe: &Option<PageFetch>,
) -> Result<Vec<Signal>, TaskError> {
    let mut inventory = FormInventory::default();
    let mut scanned = 0usize;

    if ctx.pages.is_empty() {
        let Some(page) = probe else {
            return Err(TaskError::NoContent("no pages to inspect".to_string()));
        };
        scan_document(&page.body, &page.final_url, &ctx.hostname, &mut inventory);
        scanned = 1;
    } else {
        for page in ctx.pages.values() {
            scan_document(&page.body, &page.final_url, &ctx.hostname, &mut inventory);
            scanned += 1;
        }
    }

    inventory.external_actions.sort();
    inventory.external_actions.dedup();

    let has_external = !inventory.external_actions.is_empty();
    let signals = vec![
        Signal::new(CATEGORY, "pages_scanned", json!(scanned)),
        Signal::new(CATEGORY, "form_count", json!(inventory.form_count)),
        Signal::new(CATEGORY, "password_inputs", json!(inventory.password_inputs))
            .with_severity(if inventory.password_inputs > 0 {
                Severity::Notice
            } else {
                Severity::Info
            }),
        Signal::new(CATEGORY, "email_inputs", json!(inventory.email_inputs)),
        Signal::new(CATEGORY, "payment_inputs", json!(inventory.payment_inputs))
            .with_severity(if inventory.payment_inputs > 0 {
                Severity::Warning
            } else {
                Severity::Info
            }),
        Signal::new(
            CATEGORY,
            "external_form_actions",
            json!(inventory.external_actions),
        )
        .with_severity(if has_external {
            Severity::Warning
        } else {
            Severity::Info
        }),
    ];

    Ok(signals)
}

fn scan_document(html: &str, page_url: &str, hostname: &str, inventory: &mut FormInventory) {
    let form_selector = Selector::parse("form").expect("static selector");
    let input_selector = Selector::parse("input, select, textarea").expect("static selector");

    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(html);

    for form in document.select(&form_selector) {
        inventory.form_count += 1;

        if let (Some(action), Some(base)) = (form.value().attr("action"), base.as_ref()) {
            if let Ok(resolved) = base.join(action) {
                if let Some(host) = resolved.host_str() {
                    let host = host.strip_prefix("www.").unwrap_or(host);
                    let own = hostname.strip_prefix("www.").unwrap_or(hostname);
                    if !host.eq_ignore_ascii_case(own) {
                        inventory.external_actions.push(resolved.to_string());
                    }
                }
            }
        }

        for input in form.select(&input_selector) {
            let input_type = input.value().attr("type").unwrap_or("").to_lowercase();
            let name = input.value().attr("name").unwrap_or("").to_lowercase();
            let autocomplete = input
                .value()
                .attr("autocomplete")
                .unwrap_or("")
                .to_lowercase();

            if input_type == "password" {
                inventory.password_inputs += 1;
            }
            if input_type == "email" || name.contains("email") {
                inventory.email_inputs += 1;
            }
            if autocomplete.starts_with("cc-")
                || name.contains("card")
                || name.contains("cvv")
                || name.contains("cvc")
            {
                inventory.payment_inputs += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventories_sensitive_inputs_and_external_actions() {
        let html = r#"<html><body>
          <form action="/login">
            <input type="email" name="email">
            <input type="password" name="password">
          </form>
          <form action="https://pay.thirdparty.example/checkout">
            <input name="card_number" autocomplete="cc-number">
            <input name="cvv">
          </form>
        </body></html>"#;

        let mut inventory = FormInventory::default();
        scan_document(html, "https://example.com/checkout", "example.com", &mut inventory);

        assert_eq!(inventory.form_count, 2);
        assert_eq!(inventory.password_inputs, 1);
        assert_eq!(inventory.email_inputs, 1);
        assert_eq!(inventory.payment_inputs, 2);
        assert_eq!(
            inventory.external_actions,
            vec!["https://pay.thirdparty.example/checkout"]
        );
    }

    #[test]
    fn same_site_action_is_not_external() {
        let html = r#"<form action="https://www.example.com/subscribe"><input name="email"></form>"#;
        let mut inventory = FormInventory::default();
        scan_document(html, "https://example.com/", "example.com", &mut inventory);
        assert!(inventory.external_actions.is_empty());
    }
}
