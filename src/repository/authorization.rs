//! Authorization policy resolver.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::AuthorizedDomain;
use crate::schema::authorized_domains;
use crate::with_conn;

use super::pool::{DbError, DbPool};
use super::records::{AuthorizedDomainRecord, NewAuthorizedDomain};

/// Repository over the authorized-domain table.
///
/// `resolve` is the policy lookup the orchestrator consults before crawling.
/// It has no side effects and never fails on a missing row: `None` is the
/// valid "not authorized" outcome.
#[derive(Clone)]
pub struct AuthorizationRepository {
    pool: DbPool,
}

impl AuthorizationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Add or replace an authorization entry.
    pub async fn add(&self, auth: &AuthorizedDomain) -> Result<(), DbError> {
        let created_at = Utc::now().to_rfc3339();
        let new = NewAuthorizedDomain {
            hostname: &auth.hostname,
            allow_subdomains: auth.allow_subdomains as i32,
            respect_robots: auth.respect_robots as i32,
            max_pages_per_scan: auth.max_pages_per_scan as i32,
            crawl_delay_ms: auth.crawl_delay_ms as i32,
            created_at: &created_at,
        };

        with_conn!(self.pool, conn => {
            diesel::replace_into(authorized_domains::table)
                .values(&new)
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// Remove an authorization entry. Returns false if it did not exist.
    pub async fn remove(&self, hostname: &str) -> Result<bool, DbError> {
        with_conn!(self.pool, conn => {
            let deleted = diesel::delete(
                authorized_domains::table.filter(authorized_domains::hostname.eq(hostname)),
            )
            .execute(&mut conn)
            .await?;
            Ok(deleted > 0)
        })
    }

    /// List all authorization entries.
    pub async fn list(&self) -> Result<Vec<AuthorizedDomain>, DbError> {
        with_conn!(self.pool, conn => {
            authorized_domains::table
                .order(authorized_domains::hostname.asc())
                .load::<AuthorizedDomainRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(AuthorizedDomain::from).collect())
        })
    }

    /// Resolve the crawl policy for a hostname.
    ///
    /// Checks for an exact entry first, then walks parent domains looking
    /// for one with `allow_subdomains` set. `None` means "not authorized".
    pub async fn resolve(&self, hostname: &str) -> Result<Option<AuthorizedDomain>, DbError> {
        // Exact match.
        let exact = with_conn!(self.pool, conn => {
            authorized_domains::table
                .find(hostname)
                .first::<AuthorizedDomainRecord>(&mut conn)
                .await
                .optional()?
        });
        if let Some(record) = exact {
            return Ok(Some(AuthorizedDomain::from(record)));
        }

        // Parent-domain matches ("shop.example.com" -> "example.com" -> "com").
        let mut parents = Vec::new();
        let mut rest = hostname;
        while let Some(idx) = rest.find('.') {
            rest = &rest[idx + 1..];
            if rest.contains('.') {
                parents.push(rest.to_string());
            }
        }
        if parents.is_empty() {
            return Ok(None);
        }

        let records = with_conn!(self.pool, conn => {
            authorized_domains::table
                .filter(authorized_domains::hostname.eq_any(&parents))
                .filter(authorized_domains::allow_subdomains.eq(1))
                .load::<AuthorizedDomainRecord>(&mut conn)
                .await?
        });

        // Prefer the longest (most specific) matching parent.
        let best = records
            .into_iter()
            .map(AuthorizedDomain::from)
            .filter(|a| a.covers(hostname))
            .max_by_key(|a| a.hostname.len());
        Ok(best)
    }
}
