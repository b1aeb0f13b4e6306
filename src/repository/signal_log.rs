//! Signal log repository (append-only).

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::Signal;
use crate::schema::signal_log;
use crate::with_conn;

use super::pool::{DbError, DbPool};
use super::records::{NewSignalLog, SignalLogRecord};

/// Repository for atomic risk signals recorded during a scan.
#[derive(Clone)]
pub struct SignalLogRepository {
    pool: DbPool,
}

impl SignalLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append a batch of signals for a scan.
    pub async fn append_all(&self, scan_id: &str, signals: &[Signal]) -> Result<(), DbError> {
        if signals.is_empty() {
            return Ok(());
        }
        let recorded_at = Utc::now().to_rfc3339();
        let values: Vec<String> = signals.iter().map(|s| s.value.to_string()).collect();
        let rows: Vec<NewSignalLog> = signals
            .iter()
            .zip(values.iter())
            .map(|(signal, value)| NewSignalLog {
                scan_id,
                category: &signal.category,
                name: &signal.name,
                value,
                severity: signal.severity.as_str(),
                recorded_at: &recorded_at,
            })
            .collect();

        with_conn!(self.pool, conn => {
            // SQLite via diesel-async's SyncConnectionWrapper has no batch-insert
            // specialization, so insert each row individually (same effect as
            // sync diesel's internal per-row loop for a SQLite batch insert).
            for row in &rows {
                diesel::insert_into(signal_log::table)
                    .values(row)
                    .execute(&mut conn)
                    .await?;
            }
            Ok(())
        })
    }

    /// All signals recorded for a scan.
    pub async fn list_for_scan(&self, scan_id: &str) -> Result<Vec<Signal>, DbError> {
        with_conn!(self.pool, conn => {
            signal_log::table
                .filter(signal_log::scan_id.eq(scan_id))
                .order(signal_log::id.asc())
                .load::<SignalLogRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(Signal::from).collect())
        })
    }
}
