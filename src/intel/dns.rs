//! DNS signal group.

use serde_json::json;
use trust_dns_resolver::TokioAsyncResolver;

use crate::analyzers::TaskError;
use crate::models::{Severity, Signal};

const CATEGORY: &str = "dns";

/// Collect DNS posture signals for a hostname.
///
/// Individual lookups failing (no MX, no TXT) are data, not errors; only a
/// resolver that cannot be constructed leaves the group unresolved.
pub async fn collect(hostname: &str) -> Result<Vec<Signal>, TaskError> {
    if hostname.parse::<std::net::IpAddr>().is_ok() {
        return Ok(vec![Signal::new(CATEGORY, "ip_literal", json!(true))]);
    }

    let resolver = TokioAsyncResolver::tokio_from_system_conf()
        .map_err(|e| TaskError::Other(anyhow::anyhow!("resolver init: {e}")))?;

    let mut signals = Vec::new();

    let a_count = match resolver.lookup_ip(hostname).await {
        Ok(lookup) => lookup.iter().count(),
        Err(_) => 0,
    };
    signals.push(
        Signal::new(CATEGORY, "a_records", json!(a_count)).with_severity(if a_count == 0 {
            Severity::Warning
        } else {
            Severity::Info
        }),
    );

    let mx_count = match resolver.mx_lookup(hostname).await {
        Ok(lookup) => lookup.iter().count(),
        Err(_) => 0,
    };
    signals.push(
        Signal::new(CATEGORY, "mx_records", json!(mx_count)).with_severity(if mx_count == 0 {
            Severity::Notice
        } else {
            Severity::Info
        }),
    );

    let ns_count = match resolver.ns_lookup(hostname).await {
        Ok(lookup) => lookup.iter().count(),
        Err(_) => 0,
    };
    signals.push(Signal::new(CATEGORY, "ns_records", json!(ns_count)));

    let txt_records: Vec<String> = match resolver.txt_lookup(hostname).await {
        Ok(lookup) => lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|data| String::from_utf8_lossy(data).to_string())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    let has_spf = txt_records.iter().any(|t| t.starts_with("v=spf1"));
    signals.push(
        Signal::new(CATEGORY, "spf", json!(has_spf)).with_severity(if has_spf {
            Severity::Info
        } else {
            Severity::Notice
        }),
    );

    let dmarc_host = format!("_dmarc.{hostname}");
    let has_dmarc = match resolver.txt_lookup(dmarc_host.as_str()).await {
        Ok(lookup) => lookup.iter().any(|txt| {
            txt.txt_data()
                .iter()
                .map(|data| String::from_utf8_lossy(data).to_string())
                .collect::<Vec<_>>()
                .join("")
                .starts_with("v=DMARC1")
        }),
        Err(_) => false,
    };
    signals.push(
        Signal::new(CATEGORY, "dmarc", json!(has_dmarc)).with_severity(if has_dmarc {
            Severity::Info
        } else {
            Severity::Notice
        }),
    );

    Ok(signals)
}
