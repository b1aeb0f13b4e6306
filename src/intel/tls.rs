//! TLS signal group.
//!
//! Probes HTTPS twice: once with full certificate verification and once
//! accepting invalid certificates, which separates "broken certificate"
//! from "no HTTPS at all". Certificate field introspection (exact expiry)
//! is not performed; `cert_details_available` says so explicitly.

use std::time::Duration;

use serde_json::json;
use tracing::debug;

use crate::analyzers::TaskError;
use crate::models::{Severity, Signal};

const CATEGORY: &str = "tls";

/// Collect TLS posture signals for a hostname.
pub async fn collect(hostname: &str, timeout: Duration) -> Result<Vec<Signal>, TaskError> {
    let https_url = format!("https://{hostname}/");

    let strict = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| TaskError::Other(anyhow::anyhow!("tls probe client: {e}")))?;

    let mut signals = Vec::new();

    match strict.get(&https_url).send().await {
        Ok(_) => {
            signals.push(Signal::new(CATEGORY, "https_available", json!(true)));
            signals.push(Signal::new(CATEGORY, "cert_valid", json!(true)));
        }
        Err(strict_err) => {
            debug!(error = %strict_err, "strict TLS probe failed");
            let lenient = reqwest::Client::builder()
                .timeout(timeout)
                .redirect(reqwest::redirect::Policy::none())
                .danger_accept_invalid_certs(true)
                .build()
                .map_err(|e| TaskError::Other(anyhow::anyhow!("tls probe client: {e}")))?;

            match lenient.get(&https_url).send().await {
                Ok(_) => {
                    // Server speaks TLS but the chain does not verify.
                    signals.push(Signal::new(CATEGORY, "https_available", json!(true)));
                    signals.push(
                        Signal::new(CATEGORY, "cert_valid", json!(false))
                            .with_severity(Severity::Critical),
                    );
                }
                Err(_) => {
                    signals.push(
                        Signal::new(CATEGORY, "https_available", json!(false))
                            .with_severity(Severity::Warning),
                    );
                }
            }
        }
    }

    // Does plain HTTP redirect to HTTPS?
    let http_url = format!("http://{hostname}/");
    match strict.get(&http_url).send().await {
        Ok(response) => {
            let upgrades = response.status().is_redirection()
                && response
                    .headers()
                    .get("location")
                    .and_then(|v| v.to_str().ok())
                    .map(|loc| loc.starts_with("https://"))
                    .unwrap_or(false);
            signals.push(Signal::new(CATEGORY, "http_upgrades_to_https", json!(upgrades)));
        }
        Err(_) => {
            signals.push(Signal::new(CATEGORY, "http_reachable", json!(false)));
        }
    }

    // No X.509 parsing in this stack; scoring treats expiry as unknown.
    signals.push(Signal::new(CATEGORY, "cert_details_available", json!(false)));

    Ok(signals)
}
