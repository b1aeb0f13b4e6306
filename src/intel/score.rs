//! Risk score aggregation.
//!
//! Pure functions from collected signals to per-risk-type scores, an
//! overall score, a primary risk type, and a confidence value reflecting
//! how many signal groups resolved.

use serde_json::Value;

use crate::models::Signal;

/// Aggregated risk scores, each 0-100.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskScores {
    pub phishing: u32,
    pub fraud: u32,
    pub compliance: u32,
    pub overall: u32,
    /// Risk type with the highest sub-score.
    pub primary_type: &'static str,
    /// Fraction of signal groups that resolved, 0.0-1.0.
    pub confidence: f64,
}

/// Combine signals into risk scores.
pub fn aggregate(signals: &[Signal], groups_resolved: usize, groups_total: usize) -> RiskScores {
    let lookup = SignalLookup(signals);

    let phishing = phishing_score(&lookup).min(100);
    let fraud = fraud_score(&lookup).min(100);
    let compliance = compliance_score(&lookup).min(100);

    let overall = ((phishing as f64) * 0.40 + (fraud as f64) * 0.35 + (compliance as f64) * 0.25)
        .round() as u32;

    // Ties resolve in declaration order: phishing, fraud, compliance.
    // (max_by_key keeps the last maximum, so scan in reverse.)
    let (primary_type, _) = [
        ("phishing", phishing),
        ("fraud", fraud),
        ("compliance", compliance),
    ]
    .into_iter()
    .rev()
    .max_by_key(|(_, score)| *score)
    .unwrap_or(("phishing", 0));

    let confidence = if groups_total == 0 {
        0.0
    } else {
        groups_resolved as f64 / groups_total as f64
    };

    RiskScores {
        phishing,
        fraud,
        compliance,
        overall,
        primary_type,
        confidence,
    }
}

struct SignalLookup<'a>(&'a [Signal]);

impl<'a> SignalLookup<'a> {
    fn get(&self, category: &str, name: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|s| s.category == category && s.name == name)
            .map(|s| &s.value)
    }

    fn bool_is(&self, category: &str, name: &str, expected: bool) -> bool {
        self.get(category, name)
            .and_then(Value::as_bool)
            .map(|v| v == expected)
            .unwrap_or(false)
    }

    fn num(&self, category: &str, name: &str) -> Option<i64> {
        self.get(category, name).and_then(Value::as_i64)
    }

    fn list_non_empty(&self, category: &str, name: &str) -> bool {
        self.get(category, name)
            .and_then(Value::as_array)
            .map(|a| !a.is_empty())
            .unwrap_or(false)
    }
}

fn phishing_score(s: &SignalLookup) -> u32 {
    let mut score = 0;
    if s.bool_is("tls", "cert_valid", false) {
        score += 30;
    }
    if s.bool_is("tls", "https_available", false) || s.bool_is("reachability", "https", false) {
        score += 20;
    }
    if s.bool_is("redirects", "cross_domain_redirect", true) {
        score += 15;
    }
    if s.bool_is("redirects", "meta_refresh", true) || s.bool_is("redirects", "js_redirect", true)
    {
        score += 10;
    }
    if s.list_non_empty("forms", "external_form_actions") {
        score += 20;
    }
    if s.num("forms", "payment_inputs").unwrap_or(0) > 0 {
        score += 10;
    }
    if s.num("registration", "domain_age_days")
        .map(|d| d < 180)
        .unwrap_or(false)
    {
        score += 15;
    }
    score
}

fn fraud_score(s: &SignalLookup) -> u32 {
    let mut score = 0;
    if s.bool_is("policy_pages", "policy_links_available", false) {
        score += 10;
    }
    if s.bool_is("policy_pages", "has_privacy", false) {
        score += 15;
    }
    if s.bool_is("policy_pages", "has_returns", false) {
        score += 15;
    }
    if s.num("dns", "mx_records") == Some(0) {
        score += 10;
    }
    if s.bool_is("registration", "rdap_available", false) {
        score += 10;
    }
    if s.num("registration", "domain_age_days")
        .map(|d| d < 365)
        .unwrap_or(false)
    {
        score += 20;
    }
    if s.bool_is("reachability", "reachable", false) {
        score += 10;
    }
    score
}

fn compliance_score(s: &SignalLookup) -> u32 {
    let mut score = 0;
    if s.bool_is("policy_pages", "has_privacy", false) {
        score += 30;
    }
    if s.bool_is("policy_pages", "has_terms", false) {
        score += 20;
    }
    if s.bool_is("policy_pages", "has_cookies", false) {
        score += 10;
    }
    for header in ["hsts", "csp", "x_frame_options", "x_content_type_options"] {
        if s.bool_is("headers", header, false) {
            score += 5;
        }
    }
    if s.bool_is("dns", "spf", false) {
        score += 5;
    }
    if s.bool_is("dns", "dmarc", false) {
        score += 5;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn signal(category: &str, name: &str, value: Value) -> Signal {
        Signal::new(category, name, value)
    }

    #[test]
    fn clean_site_scores_low() {
        let signals = vec![
            signal("tls", "cert_valid", json!(true)),
            signal("tls", "https_available", json!(true)),
            signal("reachability", "reachable", json!(true)),
            signal("reachability", "https", json!(true)),
            signal("redirects", "cross_domain_redirect", json!(false)),
            signal("policy_pages", "policy_links_available", json!(true)),
            signal("policy_pages", "has_privacy", json!(true)),
            signal("policy_pages", "has_terms", json!(true)),
            signal("policy_pages", "has_returns", json!(true)),
            signal("policy_pages", "has_cookies", json!(true)),
            signal("dns", "mx_records", json!(3)),
            signal("dns", "spf", json!(true)),
            signal("dns", "dmarc", json!(true)),
            signal("headers", "hsts", json!(true)),
            signal("headers", "csp", json!(true)),
            signal("headers", "x_frame_options", json!(true)),
            signal("headers", "x_content_type_options", json!(true)),
            signal("registration", "rdap_available", json!(true)),
            signal("registration", "domain_age_days", json!(4000)),
        ];

        let scores = aggregate(&signals, 8, 8);
        assert_eq!(scores.phishing, 0);
        assert_eq!(scores.fraud, 0);
        assert_eq!(scores.compliance, 0);
        assert_eq!(scores.overall, 0);
        assert!((scores.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn broken_cert_and_young_domain_read_as_phishing() {
        let signals = vec![
            signal("tls", "cert_valid", json!(false)),
            signal("tls", "https_available", json!(true)),
            signal("redirects", "cross_domain_redirect", json!(true)),
            signal("registration", "rdap_available", json!(true)),
            signal("registration", "domain_age_days", json!(12)),
        ];

        let scores = aggregate(&signals, 8, 8);
        assert_eq!(scores.primary_type, "phishing");
        assert!(scores.phishing >= 60);
        assert!(scores.overall > 0);
    }

    #[test]
    fn missing_policies_read_as_compliance_or_fraud() {
        let signals = vec![
            signal("tls", "cert_valid", json!(true)),
            signal("policy_pages", "policy_links_available", json!(true)),
            signal("policy_pages", "has_privacy", json!(false)),
            signal("policy_pages", "has_terms", json!(false)),
            signal("policy_pages", "has_cookies", json!(false)),
            signal("headers", "hsts", json!(false)),
            signal("headers", "csp", json!(false)),
        ];

        let scores = aggregate(&signals, 8, 8);
        assert_eq!(scores.primary_type, "compliance");
        assert!(scores.compliance >= 60);
    }

    #[test]
    fn confidence_reflects_resolution_ratio() {
        let scores = aggregate(&[], 4, 8);
        assert!((scores.confidence - 0.5).abs() < f64::EPSILON);
        let none = aggregate(&[], 0, 0);
        assert_eq!(none.confidence, 0.0);
    }

    #[test]
    fn scores_are_clamped() {
        // Pile on every phishing indicator.
        let signals = vec![
            signal("tls", "cert_valid", json!(false)),
            signal("tls", "https_available", json!(false)),
            signal("redirects", "cross_domain_redirect", json!(true)),
            signal("redirects", "js_redirect", json!(true)),
            signal("forms", "external_form_actions", json!(["https://x.example/p"])),
            signal("forms", "payment_inputs", json!(3)),
            signal("registration", "domain_age_days", json!(1)),
        ];
        let scores = aggregate(&signals, 8, 8);
        assert_eq!(scores.phishing, 100);
        assert!(scores.overall <= 100);
    }
}
