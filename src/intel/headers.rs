//! Security header signal group.

use serde_json::json;

use crate::analyzers::TaskError;
use crate::fetch::PageFetch;
use crate::models::{Severity, Signal};

const CATEGORY: &str = "headers";

/// Headers worth reporting on, with the signal name for each.
const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("strict-transport-security", "hsts"),
    ("content-security-policy", "csp"),
    ("x-frame-options", "x_frame_options"),
    ("x-content-type-options", "x_content_type_options"),
    ("referrer-policy", "referrer_policy"),
    ("permissions-policy", "permissions_policy"),
];

/// Inventory security headers from the homepage probe.
pub fn collect(probe: &Option<PageFetch>) -> Result<Vec<Signal>, TaskError> {
    let Some(page) = probe else {
        return Err(TaskError::NoContent("no homepage response".to_string()));
    };

    let mut signals = Vec::new();
    let mut present = 0usize;
    for (header, name) in SECURITY_HEADERS {
        let value = page.headers.get(*header);
        if value.is_some() {
            present += 1;
        }
        signals.push(
            Signal::new(CATEGORY, name, json!(value.is_some())).with_severity(
                if value.is_some() {
                    Severity::Info
                } else {
                    Severity::Notice
                },
            ),
        );
    }
    signals.push(Signal::new(
        CATEGORY,
        "security_headers_present",
        json!(present),
    ));

    if let Some(server) = page.headers.get("server") {
        signals.push(Signal::new(CATEGORY, "server", json!(server)));
    }

    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::time::Duration;

    fn probe_with(headers: &[(&str, &str)]) -> Option<PageFetch> {
        let headers: HashMap<String, String> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Some(PageFetch {
            url: "https://example.com/".to_string(),
            final_url: "https://example.com/".to_string(),
            status: reqwest::StatusCode::OK,
            headers,
            body: String::new(),
            duration: Duration::from_millis(10),
        })
    }

    #[test]
    fn counts_present_headers() {
        let probe = probe_with(&[
            ("strict-transport-security", "max-age=63072000"),
            ("x-frame-options", "DENY"),
        ]);
        let signals = collect(&probe).expect("signals");

        let count = signals
            .iter()
            .find(|s| s.name == "security_headers_present")
            .expect("count signal");
        assert_eq!(count.value, json!(2));

        let hsts = signals.iter().find(|s| s.name == "hsts").expect("hsts");
        assert_eq!(hsts.value, json!(true));
        let csp = signals.iter().find(|s| s.name == "csp").expect("csp");
        assert_eq!(csp.value, json!(false));
        assert_eq!(csp.severity, Severity::Notice);
    }

    #[test]
    fn missing_probe_is_unresolved() {
        assert!(collect(&None).is_err());
    }
}
