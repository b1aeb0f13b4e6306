//! Scan entity and lifecycle status.

use chrono::{DateTime, Utc};

/// Lifecycle state of a scan.
///
/// Transitions are strictly `Pending -> Processing -> {Completed | Failed}`;
/// terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Processing => "processing",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ScanStatus::Pending),
            "processing" => Some(ScanStatus::Processing),
            "completed" => Some(ScanStatus::Completed),
            "failed" => Some(ScanStatus::Failed),
            _ => None,
        }
    }

    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }
}

/// One scan run against a domain.
///
/// Rescans create a new row; a terminal scan is never mutated.
#[derive(Debug, Clone)]
pub struct Scan {
    pub id: String,
    pub domain_id: String,
    /// Target URL used for this run.
    pub url: String,
    pub status: ScanStatus,
    pub error: Option<String>,
    /// Reachability snapshot taken during this run.
    pub is_active: bool,
    pub status_code: Option<u16>,
    pub checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Scan {
    /// Create a new pending scan.
    pub fn new(domain_id: &str, url: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            domain_id: domain_id.to_string(),
            url: url.to_string(),
            status: ScanStatus::Pending,
            error: None,
            is_active: false,
            status_code: None,
            checked_at: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for s in [
            ScanStatus::Pending,
            ScanStatus::Processing,
            ScanStatus::Completed,
            ScanStatus::Failed,
        ] {
            assert_eq!(ScanStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(ScanStatus::from_str("bogus"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(!ScanStatus::Pending.is_terminal());
        assert!(!ScanStatus::Processing.is_terminal());
        assert!(ScanStatus::Completed.is_terminal());
        assert!(ScanStatus::Failed.is_terminal());
    }
}
