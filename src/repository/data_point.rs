//! Data point persistence.
//!
//! Every extraction result is written twice inside one transaction: an
//! append-only scan-scoped snapshot, and a per-(domain, key) "latest" row
//! kept current by upsert. Concurrent writers for the same key are
//! serialized by the upsert itself, not by application locks.

use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use crate::models::{DataPoint, DataPointKey};
use crate::schema::{domain_data_points, scan_data_points};
use crate::with_conn;

use super::pool::{DbError, DbPool};
use super::records::{DomainDataPointRecord, ScanDataPointRecord};

/// Repository for scan- and domain-scoped data points.
#[derive(Clone)]
pub struct DataPointRepository {
    pool: DbPool,
}

impl DataPointRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Persist one extraction result for a scan.
    ///
    /// Inserts the scan-scoped snapshot and upserts the domain-scoped latest
    /// row atomically.
    pub async fn record(
        &self,
        domain_id: &str,
        scan_id: &str,
        point: &DataPoint,
    ) -> Result<(), DbError> {
        let key = point.key.as_str().to_string();
        let label = point.label.clone();
        let payload = point.payload.to_string();
        let sources =
            serde_json::to_string(&point.sources).unwrap_or_else(|_| "[]".to_string());
        let raw_response = point.raw_response.clone();
        let extracted_at = point.extracted_at.to_rfc3339();
        let domain_id = domain_id.to_string();
        let scan_id = scan_id.to_string();

        with_conn!(self.pool, conn => {
            conn.transaction(|conn| {
                Box::pin(async move {
                    diesel::insert_into(scan_data_points::table)
                        .values((
                            scan_data_points::scan_id.eq(&scan_id),
                            scan_data_points::key.eq(&key),
                            scan_data_points::label.eq(&label),
                            scan_data_points::payload.eq(&payload),
                            scan_data_points::sources.eq(&sources),
                            scan_data_points::raw_response.eq(raw_response.as_deref()),
                            scan_data_points::extracted_at.eq(&extracted_at),
                        ))
                        .execute(conn)
                        .await?;

                    diesel::insert_into(domain_data_points::table)
                        .values((
                            domain_data_points::domain_id.eq(&domain_id),
                            domain_data_points::key.eq(&key),
                            domain_data_points::label.eq(&label),
                            domain_data_points::payload.eq(&payload),
                            domain_data_points::sources.eq(&sources),
                            domain_data_points::raw_response.eq(raw_response.as_deref()),
                            domain_data_points::extracted_at.eq(&extracted_at),
                        ))
                        .on_conflict((domain_data_points::domain_id, domain_data_points::key))
                        .do_update()
                        .set((
                            domain_data_points::label.eq(&label),
                            domain_data_points::payload.eq(&payload),
                            domain_data_points::sources.eq(&sources),
                            domain_data_points::raw_response.eq(raw_response.as_deref()),
                            domain_data_points::extracted_at.eq(&extracted_at),
                        ))
                        .execute(conn)
                        .await?;

                    Ok(())
                })
            })
            .await
        })
    }

    /// Latest domain-scoped data point for a key, if any.
    pub async fn get_domain_point(
        &self,
        domain_id: &str,
        key: DataPointKey,
    ) -> Result<Option<DataPoint>, DbError> {
        with_conn!(self.pool, conn => {
            domain_data_points::table
                .find((domain_id, key.as_str()))
                .first::<DomainDataPointRecord>(&mut conn)
                .await
                .optional()
                .map(|r| r.map(DataPoint::from))
        })
    }

    /// All scan-scoped data points for a scan.
    pub async fn list_for_scan(&self, scan_id: &str) -> Result<Vec<DataPoint>, DbError> {
        with_conn!(self.pool, conn => {
            scan_data_points::table
                .filter(scan_data_points::scan_id.eq(scan_id))
                .order(scan_data_points::id.asc())
                .load::<ScanDataPointRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(DataPoint::from).collect())
        })
    }

    /// All domain-scoped latest rows for a domain.
    pub async fn list_for_domain(&self, domain_id: &str) -> Result<Vec<DataPoint>, DbError> {
        with_conn!(self.pool, conn => {
            domain_data_points::table
                .filter(domain_data_points::domain_id.eq(domain_id))
                .load::<DomainDataPointRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(DataPoint::from).collect())
        })
    }
}
