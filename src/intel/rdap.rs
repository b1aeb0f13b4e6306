//! Domain registration signal group (RDAP).
//!
//! Queries the rdap.org bootstrap redirector. TLDs without an RDAP service
//! and unregistered domains resolve to `rdap_available=false`; only a
//! transport failure leaves the group unresolved.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::analyzers::TaskError;
use crate::models::{Severity, Signal};

const CATEGORY: &str = "registration";

/// Domains younger than this are flagged.
const YOUNG_DOMAIN_DAYS: i64 = 180;

#[derive(Debug, Deserialize)]
struct RdapResponse {
    #[serde(default)]
    events: Vec<RdapEvent>,
}

#[derive(Debug, Deserialize)]
struct RdapEvent {
    #[serde(rename = "eventAction")]
    action: String,
    #[serde(rename = "eventDate")]
    date: String,
}

/// Collect registration-age signals for a hostname.
pub async fn collect(
    hostname: &str,
    endpoint: &str,
    timeout: Duration,
) -> Result<Vec<Signal>, TaskError> {
    if hostname.parse::<std::net::IpAddr>().is_ok() {
        return Ok(vec![Signal::new(CATEGORY, "rdap_available", json!(false))]);
    }

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TaskError::Other(anyhow::anyhow!("rdap client: {e}")))?;

    let url = format!("{}/domain/{}", endpoint.trim_end_matches('/'), hostname);
    let response = client
        .get(&url)
        .header("accept", "application/rdap+json")
        .send()
        .await
        .map_err(|e| TaskError::Other(anyhow::anyhow!("rdap request: {e}")))?;

    if !response.status().is_success() {
        debug!(status = response.status().as_u16(), "RDAP lookup unavailable");
        return Ok(vec![Signal::new(CATEGORY, "rdap_available", json!(false))]);
    }

    let body: RdapResponse = match response.json().await {
        Ok(b) => b,
        Err(e) => {
            debug!(error = %e, "RDAP response not parseable");
            return Ok(vec![Signal::new(CATEGORY, "rdap_available", json!(false))]);
        }
    };

    let registration = body
        .events
        .iter()
        .find(|e| e.action == "registration")
        .and_then(|e| DateTime::parse_from_rfc3339(&e.date).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let mut signals = vec![Signal::new(CATEGORY, "rdap_available", json!(true))];
    match registration {
        Some(registered) => {
            let age_days = (Utc::now() - registered).num_days();
            signals.push(Signal::new(
                CATEGORY,
                "registration_date",
                json!(registered.to_rfc3339()),
            ));
            signals.push(
                Signal::new(CATEGORY, "domain_age_days", json!(age_days)).with_severity(
                    if age_days < YOUNG_DOMAIN_DAYS {
                        Severity::Warning
                    } else {
                        Severity::Info
                    },
                ),
            );
        }
        None => {
            signals.push(Signal::new(
                CATEGORY,
                "registration_date_available",
                json!(false),
            ));
        }
    }

    Ok(signals)
}
