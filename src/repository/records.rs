//! Diesel ORM models for database tables.
//!
//! These records provide compile-time type checking for database operations;
//! `From` impls convert them into the domain models.

use diesel::prelude::*;

use crate::models::{
    AuthorizedDomain, DataPoint, DataPointKey, Domain, FetchLogEntry, FetchSource, Scan,
    ScanStatus, Severity, Signal,
};
use crate::schema;

use super::{parse_datetime, parse_datetime_opt};

/// Domain record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::domains)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DomainRecord {
    pub id: String,
    pub hostname: String,
    pub is_active: i32,
    pub status_code: Option<i32>,
    pub manual_risk: Option<String>,
    pub last_checked_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<DomainRecord> for Domain {
    fn from(record: DomainRecord) -> Self {
        Domain {
            id: record.id,
            hostname: record.hostname,
            is_active: record.is_active != 0,
            status_code: record.status_code.map(|c| c as u16),
            manual_risk: record.manual_risk,
            last_checked_at: parse_datetime_opt(record.last_checked_at),
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// New domain for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::domains)]
pub struct NewDomain<'a> {
    pub id: &'a str,
    pub hostname: &'a str,
    pub is_active: i32,
    pub status_code: Option<i32>,
    pub manual_risk: Option<&'a str>,
    pub last_checked_at: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Scan record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::scans)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ScanRecord {
    pub id: String,
    pub domain_id: String,
    pub url: String,
    pub status: String,
    pub error: Option<String>,
    pub is_active: i32,
    pub status_code: Option<i32>,
    pub checked_at: Option<String>,
    pub created_at: String,
}

impl From<ScanRecord> for Scan {
    fn from(record: ScanRecord) -> Self {
        Scan {
            id: record.id,
            domain_id: record.domain_id,
            url: record.url,
            status: ScanStatus::from_str(&record.status).unwrap_or(ScanStatus::Pending),
            error: record.error,
            is_active: record.is_active != 0,
            status_code: record.status_code.map(|c| c as u16),
            checked_at: parse_datetime_opt(record.checked_at),
            created_at: parse_datetime(&record.created_at),
        }
    }
}

/// New scan for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::scans)]
pub struct NewScan<'a> {
    pub id: &'a str,
    pub domain_id: &'a str,
    pub url: &'a str,
    pub status: &'a str,
    pub error: Option<&'a str>,
    pub is_active: i32,
    pub status_code: Option<i32>,
    pub checked_at: Option<&'a str>,
    pub created_at: &'a str,
}

/// Authorized domain record from the database.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = schema::authorized_domains)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AuthorizedDomainRecord {
    pub hostname: String,
    pub allow_subdomains: i32,
    pub respect_robots: i32,
    pub max_pages_per_scan: i32,
    pub crawl_delay_ms: i32,
    pub created_at: String,
}

impl From<AuthorizedDomainRecord> for AuthorizedDomain {
    fn from(record: AuthorizedDomainRecord) -> Self {
        AuthorizedDomain {
            hostname: record.hostname,
            allow_subdomains: record.allow_subdomains != 0,
            respect_robots: record.respect_robots != 0,
            max_pages_per_scan: record.max_pages_per_scan.max(0) as u32,
            crawl_delay_ms: record.crawl_delay_ms.max(0) as u64,
            created_at: parse_datetime(&record.created_at),
        }
    }
}

/// New authorized domain for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::authorized_domains)]
pub struct NewAuthorizedDomain<'a> {
    pub hostname: &'a str,
    pub allow_subdomains: i32,
    pub respect_robots: i32,
    pub max_pages_per_scan: i32,
    pub crawl_delay_ms: i32,
    pub created_at: &'a str,
}

/// Fetch log record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::fetch_log)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FetchLogRecord {
    pub id: i32,
    pub scan_id: String,
    pub url: String,
    pub source: String,
    pub status_code: Option<i32>,
    pub error: Option<String>,
    pub duration_ms: i32,
    pub robots_allowed: i32,
    pub fetched_at: String,
}

impl From<FetchLogRecord> for FetchLogEntry {
    fn from(record: FetchLogRecord) -> Self {
        FetchLogEntry {
            id: Some(record.id as i64),
            scan_id: record.scan_id,
            url: record.url,
            source: FetchSource::from_str(&record.source).unwrap_or(FetchSource::Link),
            status_code: record.status_code.map(|c| c as u16),
            error: record.error,
            duration_ms: record.duration_ms.max(0) as u64,
            robots_allowed: record.robots_allowed != 0,
            fetched_at: parse_datetime(&record.fetched_at),
        }
    }
}

/// New fetch log entry for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::fetch_log)]
pub struct NewFetchLog<'a> {
    pub scan_id: &'a str,
    pub url: &'a str,
    pub source: &'a str,
    pub status_code: Option<i32>,
    pub error: Option<&'a str>,
    pub duration_ms: i32,
    pub robots_allowed: i32,
    pub fetched_at: &'a str,
}

/// Scan-scoped data point record.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::scan_data_points)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ScanDataPointRecord {
    pub id: i32,
    pub scan_id: String,
    pub key: String,
    pub label: String,
    pub payload: String,
    pub sources: String,
    pub raw_response: Option<String>,
    pub extracted_at: String,
}

/// Domain-scoped "latest" data point record.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = schema::domain_data_points)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DomainDataPointRecord {
    pub domain_id: String,
    pub key: String,
    pub label: String,
    pub payload: String,
    pub sources: String,
    pub raw_response: Option<String>,
    pub extracted_at: String,
}

fn data_point_from_parts(
    key: &str,
    label: String,
    payload: String,
    sources: String,
    raw_response: Option<String>,
    extracted_at: &str,
) -> DataPoint {
    DataPoint {
        key: DataPointKey::from_str(key).unwrap_or(DataPointKey::ContactDetails),
        label,
        payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
        sources: serde_json::from_str(&sources).unwrap_or_default(),
        raw_response,
        extracted_at: parse_datetime(extracted_at),
    }
}

impl From<ScanDataPointRecord> for DataPoint {
    fn from(record: ScanDataPointRecord) -> Self {
        data_point_from_parts(
            &record.key,
            record.label,
            record.payload,
            record.sources,
            record.raw_response,
            &record.extracted_at,
        )
    }
}

impl From<DomainDataPointRecord> for DataPoint {
    fn from(record: DomainDataPointRecord) -> Self {
        data_point_from_parts(
            &record.key,
            record.label,
            record.payload,
            record.sources,
            record.raw_response,
            &record.extracted_at,
        )
    }
}

/// Signal log record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::signal_log)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SignalLogRecord {
    pub id: i32,
    pub scan_id: String,
    pub category: String,
    pub name: String,
    pub value: String,
    pub severity: String,
    pub recorded_at: String,
}

impl From<SignalLogRecord> for Signal {
    fn from(record: SignalLogRecord) -> Self {
        Signal {
            category: record.category,
            name: record.name,
            value: serde_json::from_str(&record.value).unwrap_or(serde_json::Value::Null),
            severity: Severity::from_str(&record.severity).unwrap_or(Severity::Info),
        }
    }
}

/// New signal log entry for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::signal_log)]
pub struct NewSignalLog<'a> {
    pub scan_id: &'a str,
    pub category: &'a str,
    pub name: &'a str,
    pub value: &'a str,
    pub severity: &'a str,
    pub recorded_at: &'a str,
}
