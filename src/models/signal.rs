//! Atomic risk signals recorded during intelligence collection.

use serde_json::Value;

/// Severity tag attached to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Notice,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Severity::Info),
            "notice" => Some(Severity::Notice),
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// One atomic signal computed by a signal group.
#[derive(Debug, Clone)]
pub struct Signal {
    /// Signal group name, e.g. "dns" or "tls".
    pub category: String,
    pub name: String,
    pub value: Value,
    pub severity: Severity,
}

impl Signal {
    pub fn new(category: &str, name: &str, value: Value) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            value,
            severity: Severity::Info,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_round_trip() {
        for s in [
            Severity::Info,
            Severity::Notice,
            Severity::Warning,
            Severity::Critical,
        ] {
            assert_eq!(Severity::from_str(s.as_str()), Some(s));
        }
    }
}
