//! Extraction results.

use chrono::{DateTime, Utc};

/// The fixed roster of extraction result keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataPointKey {
    ContactDetails,
    HomepageSkusSummary,
    PolicyLinks,
    AiGeneratedLikelihood,
    DomainRiskAssessment,
    DomainIntelSignals,
}

impl DataPointKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataPointKey::ContactDetails => "contact_details",
            DataPointKey::HomepageSkusSummary => "homepage_skus_summary",
            DataPointKey::PolicyLinks => "policy_links",
            DataPointKey::AiGeneratedLikelihood => "ai_generated_likelihood",
            DataPointKey::DomainRiskAssessment => "domain_risk_assessment",
            DataPointKey::DomainIntelSignals => "domain_intel_signals",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "contact_details" => Some(DataPointKey::ContactDetails),
            "homepage_skus_summary" => Some(DataPointKey::HomepageSkusSummary),
            "policy_links" => Some(DataPointKey::PolicyLinks),
            "ai_generated_likelihood" => Some(DataPointKey::AiGeneratedLikelihood),
            "domain_risk_assessment" => Some(DataPointKey::DomainRiskAssessment),
            "domain_intel_signals" => Some(DataPointKey::DomainIntelSignals),
            _ => None,
        }
    }
}

/// One extraction result.
///
/// Persisted twice: an immutable scan-scoped snapshot, and an upserted
/// domain-scoped "latest" row keyed by (domain, key).
#[derive(Debug, Clone)]
pub struct DataPoint {
    pub key: DataPointKey,
    pub label: String,
    /// Opaque analyzer result payload.
    pub payload: serde_json::Value,
    /// URLs that informed the result.
    pub sources: Vec<String>,
    /// Raw analyzer response kept for audit/debugging.
    pub raw_response: Option<String>,
    pub extracted_at: DateTime<Utc>,
}

impl DataPoint {
    pub fn new(key: DataPointKey, label: &str, payload: serde_json::Value) -> Self {
        Self {
            key,
            label: label.to_string(),
            payload,
            sources: Vec::new(),
            raw_response: None,
            extracted_at: Utc::now(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_raw_response(mut self, raw: String) -> Self {
        self.raw_response = Some(raw);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trip() {
        for k in [
            DataPointKey::ContactDetails,
            DataPointKey::HomepageSkusSummary,
            DataPointKey::PolicyLinks,
            DataPointKey::AiGeneratedLikelihood,
            DataPointKey::DomainRiskAssessment,
            DataPointKey::DomainIntelSignals,
        ] {
            assert_eq!(DataPointKey::from_str(k.as_str()), Some(k));
        }
    }
}
