//! Fetch log repository (append-only).

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::FetchLogEntry;
use crate::schema::fetch_log;
use crate::with_conn;

use super::pool::{DbError, DbPool};
use super::records::{FetchLogRecord, NewFetchLog};

/// Repository for per-attempt fetch log rows.
///
/// Rows are append-only; concurrent writers need no coordination.
#[derive(Clone)]
pub struct FetchLogRepository {
    pool: DbPool,
}

impl FetchLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append one fetch attempt.
    pub async fn append(&self, entry: &FetchLogEntry) -> Result<(), DbError> {
        let fetched_at = entry.fetched_at.to_rfc3339();
        let new = NewFetchLog {
            scan_id: &entry.scan_id,
            url: &entry.url,
            source: entry.source.as_str(),
            status_code: entry.status_code.map(|c| c as i32),
            error: entry.error.as_deref(),
            duration_ms: entry.duration_ms.min(i32::MAX as u64) as i32,
            robots_allowed: entry.robots_allowed as i32,
            fetched_at: &fetched_at,
        };

        with_conn!(self.pool, conn => {
            diesel::insert_into(fetch_log::table)
                .values(&new)
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// All fetch attempts for a scan, in insertion order.
    pub async fn list_for_scan(&self, scan_id: &str) -> Result<Vec<FetchLogEntry>, DbError> {
        with_conn!(self.pool, conn => {
            fetch_log::table
                .filter(fetch_log::scan_id.eq(scan_id))
                .order(fetch_log::id.asc())
                .load::<FetchLogRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(FetchLogEntry::from).collect())
        })
    }

    /// Number of fetch attempts recorded for a scan.
    pub async fn count_for_scan(&self, scan_id: &str) -> Result<i64, DbError> {
        use diesel::dsl::count_star;
        with_conn!(self.pool, conn => {
            fetch_log::table
                .filter(fetch_log::scan_id.eq(scan_id))
                .select(count_star())
                .first(&mut conn)
                .await
        })
    }
}
