//! Scan repository and lifecycle transitions.
//!
//! Transition methods carry their precondition in the SQL `WHERE` clause, so
//! an out-of-order or repeated transition affects zero rows instead of
//! corrupting a terminal scan.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::{Scan, ScanStatus};
use crate::schema::scans;
use crate::with_conn;

use super::pool::{DbError, DbPool};
use super::records::{NewScan, ScanRecord};

/// Repository for scan rows.
#[derive(Clone)]
pub struct ScanRepository {
    pool: DbPool,
}

impl ScanRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new pending scan row.
    pub async fn create(&self, scan: &Scan) -> Result<(), DbError> {
        let created_at = scan.created_at.to_rfc3339();
        let checked_at = scan.checked_at.map(|dt| dt.to_rfc3339());
        let new = NewScan {
            id: &scan.id,
            domain_id: &scan.domain_id,
            url: &scan.url,
            status: scan.status.as_str(),
            error: scan.error.as_deref(),
            is_active: scan.is_active as i32,
            status_code: scan.status_code.map(|c| c as i32),
            checked_at: checked_at.as_deref(),
            created_at: &created_at,
        };

        with_conn!(self.pool, conn => {
            diesel::insert_into(scans::table)
                .values(&new)
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// Look up a scan by id.
    pub async fn get(&self, id: &str) -> Result<Option<Scan>, DbError> {
        with_conn!(self.pool, conn => {
            scans::table
                .find(id)
                .first::<ScanRecord>(&mut conn)
                .await
                .optional()
                .map(|r| r.map(Scan::from))
        })
    }

    /// List scans for a domain, newest first.
    pub async fn list_for_domain(&self, domain_id: &str) -> Result<Vec<Scan>, DbError> {
        with_conn!(self.pool, conn => {
            scans::table
                .filter(scans::domain_id.eq(domain_id))
                .order(scans::created_at.desc())
                .load::<ScanRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(Scan::from).collect())
        })
    }

    /// `pending -> processing`. Returns false if the scan was not pending.
    pub async fn mark_processing(&self, id: &str) -> Result<bool, DbError> {
        with_conn!(self.pool, conn => {
            let updated = diesel::update(
                scans::table
                    .find(id)
                    .filter(scans::status.eq(ScanStatus::Pending.as_str())),
            )
            .set(scans::status.eq(ScanStatus::Processing.as_str()))
            .execute(&mut conn)
            .await?;
            Ok(updated > 0)
        })
    }

    /// `processing -> completed`. Refuses to touch a terminal row.
    pub async fn mark_completed(&self, id: &str) -> Result<bool, DbError> {
        with_conn!(self.pool, conn => {
            let updated = diesel::update(
                scans::table
                    .find(id)
                    .filter(scans::status.eq(ScanStatus::Processing.as_str())),
            )
            .set(scans::status.eq(ScanStatus::Completed.as_str()))
            .execute(&mut conn)
            .await?;
            Ok(updated > 0)
        })
    }

    /// `pending|processing -> failed`, recording the error message.
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<bool, DbError> {
        with_conn!(self.pool, conn => {
            let updated = diesel::update(
                scans::table.find(id).filter(
                    scans::status
                        .eq(ScanStatus::Pending.as_str())
                        .or(scans::status.eq(ScanStatus::Processing.as_str())),
                ),
            )
            .set((
                scans::status.eq(ScanStatus::Failed.as_str()),
                scans::error.eq(Some(error)),
            ))
            .execute(&mut conn)
            .await?;
            Ok(updated > 0)
        })
    }

    /// Record the reachability snapshot for this run.
    pub async fn set_reachability(
        &self,
        id: &str,
        is_active: bool,
        status_code: Option<u16>,
    ) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        with_conn!(self.pool, conn => {
            diesel::update(scans::table.find(id))
                .set((
                    scans::is_active.eq(is_active as i32),
                    scans::status_code.eq(status_code.map(|c| c as i32)),
                    scans::checked_at.eq(Some(now.as_str())),
                ))
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }
}
