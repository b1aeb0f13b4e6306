//! Domain repository.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::Domain;
use crate::schema::domains;
use crate::with_conn;

use super::pool::{DbError, DbPool};
use super::records::{DomainRecord, NewDomain};

/// Repository for domain rows.
#[derive(Clone)]
pub struct DomainRepository {
    pool: DbPool,
}

impl DomainRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert the domain if unknown, otherwise bump its `updated_at`.
    ///
    /// Returns the stored domain. Scans call this first, so the row exists
    /// before any network I/O starts.
    pub async fn upsert(&self, domain: &Domain) -> Result<Domain, DbError> {
        let now = Utc::now().to_rfc3339();
        let created_at = domain.created_at.to_rfc3339();
        let last_checked_at = domain.last_checked_at.map(|dt| dt.to_rfc3339());

        let new = NewDomain {
            id: &domain.id,
            hostname: &domain.hostname,
            is_active: domain.is_active as i32,
            status_code: domain.status_code.map(|c| c as i32),
            manual_risk: domain.manual_risk.as_deref(),
            last_checked_at: last_checked_at.as_deref(),
            created_at: &created_at,
            updated_at: &now,
        };

        with_conn!(self.pool, conn => {
            diesel::insert_into(domains::table)
                .values(&new)
                .on_conflict(domains::id)
                .do_update()
                .set(domains::updated_at.eq(&now))
                .execute(&mut conn)
                .await?;

            domains::table
                .find(&domain.id)
                .first::<DomainRecord>(&mut conn)
                .await
                .map(Domain::from)
        })
    }

    /// Look up a domain by id.
    pub async fn get(&self, id: &str) -> Result<Option<Domain>, DbError> {
        with_conn!(self.pool, conn => {
            domains::table
                .find(id)
                .first::<DomainRecord>(&mut conn)
                .await
                .optional()
                .map(|r| r.map(Domain::from))
        })
    }

    /// Look up a domain by hostname.
    pub async fn get_by_hostname(&self, hostname: &str) -> Result<Option<Domain>, DbError> {
        with_conn!(self.pool, conn => {
            domains::table
                .filter(domains::hostname.eq(hostname))
                .first::<DomainRecord>(&mut conn)
                .await
                .optional()
                .map(|r| r.map(Domain::from))
        })
    }

    /// Record the reachability observed during a scan.
    pub async fn set_reachability(
        &self,
        id: &str,
        is_active: bool,
        status_code: Option<u16>,
    ) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        with_conn!(self.pool, conn => {
            diesel::update(domains::table.find(id))
                .set((
                    domains::is_active.eq(is_active as i32),
                    domains::status_code.eq(status_code.map(|c| c as i32)),
                    domains::last_checked_at.eq(Some(now.as_str())),
                    domains::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }
}
