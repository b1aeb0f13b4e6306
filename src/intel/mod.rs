//! Risk intelligence collection and aggregation.
//!
//! Signal groups are computed independently; a group that cannot resolve
//! (offline DNS, unsupported RDAP, broken TLS endpoint) degrades the
//! confidence of the final assessment instead of failing the task.

pub mod dns;
pub mod forms;
pub mod headers;
pub mod rdap;
pub mod redirects;
pub mod score;
pub mod tls;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::analyzers::{Analyzer, TaskContext, TaskError};
use crate::fetch::PageFetch;
use crate::models::{DataPoint, DataPointKey, FetchSource, Severity, Signal};

pub use score::{aggregate, RiskScores};

/// Configuration for the risk intelligence task.
#[derive(Debug, Clone)]
pub struct IntelConfig {
    /// Hard deadline for the whole task; on expiry the scan proceeds
    /// without a risk assessment.
    pub deadline: Duration,
    /// Per-request timeout for probes.
    pub request_timeout: Duration,
    /// RDAP bootstrap endpoint.
    pub rdap_endpoint: String,
}

impl Default for IntelConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(90),
            request_timeout: Duration::from_secs(15),
            rdap_endpoint: "https://rdap.org".to_string(),
        }
    }
}

/// The risk-intelligence extraction task.
pub struct RiskIntelAnalyzer {
    config: IntelConfig,
}

impl RiskIntelAnalyzer {
    pub fn new(config: IntelConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Analyzer for RiskIntelAnalyzer {
    fn key(&self) -> DataPointKey {
        DataPointKey::DomainRiskAssessment
    }

    fn name(&self) -> &'static str {
        "risk-intel"
    }

    fn deadline(&self) -> Option<Duration> {
        Some(self.config.deadline)
    }

    async fn run(&self, ctx: &TaskContext) -> Result<Vec<DataPoint>, TaskError> {
        // One probe of the target feeds the reachability, header, and form
        // groups; the crawler's pages are reused where they exist.
        let probe = match ctx.client.fetch(&ctx.url, FetchSource::Homepage).await {
            Ok(page) => Some(page),
            Err(e) => {
                debug!(error = %e, "intel probe fetch failed");
                None
            }
        };

        let mut groups = GroupCollector::default();

        groups.add("reachability", reachability_signals(&probe));
        groups.add("headers", headers::collect(&probe));
        groups.add("forms", forms::collect(ctx, &probe));

        let (redirect_sigs, dns_sigs, tls_sigs, rdap_sigs, policy_sigs) = tokio::join!(
            redirects::collect(&ctx.url, self.config.request_timeout),
            dns::collect(&ctx.hostname),
            tls::collect(&ctx.hostname, self.config.request_timeout),
            rdap::collect(&ctx.hostname, &self.config.rdap_endpoint, self.config.request_timeout),
            policy_page_signals(ctx),
        );
        groups.add("redirects", redirect_sigs);
        groups.add("dns", dns_sigs);
        groups.add("tls", tls_sigs);
        groups.add("registration", rdap_sigs);
        groups.add("policy_pages", policy_sigs);

        // Every atomic signal is logged for audit, resolved or not.
        if let Err(e) = ctx.signals.append_all(&ctx.scan_id, &groups.signals).await {
            warn!(error = %e, "failed to persist signal log");
        }

        let scores = aggregate(&groups.signals, groups.resolved, groups.total);

        let assessment = DataPoint::new(
            DataPointKey::DomainRiskAssessment,
            "Domain risk assessment",
            json!({
                "overall_score": scores.overall,
                "primary_risk_type": scores.primary_type,
                "confidence": scores.confidence,
                "scores": {
                    "phishing": scores.phishing,
                    "fraud": scores.fraud,
                    "compliance": scores.compliance,
                },
                "groups_resolved": groups.resolved,
                "groups_total": groups.total,
            }),
        )
        .with_sources(vec![ctx.url.clone()]);

        let signal_dump = DataPoint::new(
            DataPointKey::DomainIntelSignals,
            "Collected intelligence signals",
            json!({
                "signals": groups
                    .signals
                    .iter()
                    .map(|s| json!({
                        "category": s.category,
                        "name": s.name,
                        "value": s.value,
                        "severity": s.severity.as_str(),
                    }))
                    .collect::<Vec<_>>(),
            }),
        )
        .with_sources(vec![ctx.url.clone()]);

        Ok(vec![assessment, signal_dump])
    }
}

/// Accumulates signal groups and tracks how many resolved.
#[derive(Default)]
struct GroupCollector {
    signals: Vec<Signal>,
    resolved: usize,
    total: usize,
}

impl GroupCollector {
    fn add(&mut self, group: &str, result: Result<Vec<Signal>, TaskError>) {
        self.total += 1;
        match result {
            Ok(signals) => {
                self.resolved += 1;
                self.signals.extend(signals);
            }
            Err(e) => {
                debug!(group, error = %e, "signal group unresolved");
                self.signals.push(
                    Signal::new(group, "group_resolved", json!(false))
                        .with_severity(Severity::Notice),
                );
            }
        }
    }
}

/// Reachability and latency from the intel probe.
fn reachability_signals(probe: &Option<PageFetch>) -> Result<Vec<Signal>, TaskError> {
    let Some(page) = probe else {
        return Ok(vec![
            Signal::new("reachability", "reachable", json!(false))
                .with_severity(Severity::Warning),
        ]);
    };

    let latency_ms = page.duration.as_millis() as u64;
    Ok(vec![
        Signal::new("reachability", "reachable", json!(page.is_success())),
        Signal::new("reachability", "status_code", json!(page.status.as_u16())),
        Signal::new("reachability", "latency_ms", json!(latency_ms)),
        Signal::new(
            "reachability",
            "https",
            json!(page.final_url.starts_with("https://")),
        ),
    ])
}

/// Policy-page existence, read from Stage A's persisted policy-links row.
///
/// This is the cross-stage dependency that forces Stage B to run after
/// Stage A's persistence barrier.
async fn policy_page_signals(ctx: &TaskContext) -> Result<Vec<Signal>, TaskError> {
    let point = ctx
        .data_points
        .get_domain_point(&ctx.domain_id, DataPointKey::PolicyLinks)
        .await
        .map_err(|e| TaskError::Other(anyhow::anyhow!("policy links read: {e}")))?;

    let Some(point) = point else {
        // Unauthorized domains never ran the policy-links task.
        return Ok(vec![Signal::new(
            "policy_pages",
            "policy_links_available",
            json!(false),
        )]);
    };

    let mut signals = vec![Signal::new(
        "policy_pages",
        "policy_links_available",
        json!(true),
    )];
    for kind in ["privacy", "terms", "returns", "shipping", "cookies"] {
        let present = point
            .payload
            .get(kind)
            .map(|v| !v.is_null())
            .unwrap_or(false);
        let severity = if present || kind == "cookies" {
            Severity::Info
        } else {
            Severity::Notice
        };
        signals.push(
            Signal::new("policy_pages", &format!("has_{kind}"), json!(present))
                .with_severity(severity),
        );
    }
    Ok(signals)
}
