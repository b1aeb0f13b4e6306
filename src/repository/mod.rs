//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking,
//! running over diesel-async's SQLite connection wrapper.

pub mod authorization;
pub mod data_point;
pub mod domain;
pub mod fetch_log;
pub mod migrations;
pub mod pool;
pub mod records;
pub mod scan;
pub mod signal_log;

pub use authorization::AuthorizationRepository;
pub use data_point::DataPointRepository;
pub use domain::DomainRepository;
pub use fetch_log::FetchLogRepository;
pub use pool::{DbError, DbPool};
pub use scan::ScanRepository;
pub use signal_log::SignalLogRepository;

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_datetime_tolerates_garbage() {
        assert_eq!(parse_datetime("not a date"), DateTime::UNIX_EPOCH);
        let ts = Utc::now();
        assert_eq!(parse_datetime(&ts.to_rfc3339()), ts);
    }
}
