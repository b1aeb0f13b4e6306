//! Database connection pool.
//!
//! SQLite connections are created on demand through diesel-async's
//! `SyncConnectionWrapper`. The enum-plus-macro shape leaves room for a
//! server-grade backend without touching repository code.

use std::path::Path;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, SimpleAsyncConnection};

/// Diesel error type alias.
pub type DbError = diesel::result::Error;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

/// SQLite connection pool (lightweight - creates connections on demand).
#[derive(Clone)]
pub struct SqlitePool {
    database_url: String,
}

impl SqlitePool {
    /// Create a new SQLite pool.
    pub fn new(database_url: &str) -> Self {
        // Strip sqlite: prefix if present
        let url = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
        }
    }

    /// Create pool from a file path.
    pub fn from_path(path: &Path) -> Self {
        Self::new(&path.display().to_string())
    }

    /// Get a connection.
    ///
    /// Connections wait out short write locks instead of erroring; WAL
    /// keeps concurrent readers unblocked during stage persistence.
    pub async fn get(&self) -> Result<SqliteConn, DbError> {
        let mut conn = SqliteConn::establish(&self.database_url)
            .await
            .map_err(|e| {
                DbError::DatabaseError(
                    diesel::result::DatabaseErrorKind::Unknown,
                    Box::new(e.to_string()),
                )
            })?;
        conn.batch_execute(
            "PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;",
        )
        .await?;
        Ok(conn)
    }

    /// Get the database URL.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

/// Unified database pool.
#[derive(Clone)]
pub enum DbPool {
    Sqlite(SqlitePool),
}

impl DbPool {
    /// Create a pool from a database URL.
    pub fn from_url(url: &str) -> Self {
        DbPool::Sqlite(SqlitePool::new(url))
    }

    /// Create a SQLite pool from a file path.
    pub fn sqlite_from_path(path: &Path) -> Self {
        DbPool::Sqlite(SqlitePool::from_path(path))
    }

    /// Get the underlying database URL.
    pub fn database_url(&self) -> &str {
        match self {
            DbPool::Sqlite(pool) => pool.database_url(),
        }
    }
}

/// Macro for running database operations on the pooled backend.
///
/// # Example
/// ```ignore
/// with_conn!(self.pool, conn => {
///     scans::table.load::<ScanRecord>(&mut conn).await
/// })
/// ```
#[macro_export]
macro_rules! with_conn {
    ($pool:expr, $conn:ident => $body:expr) => {{
        match &$pool {
            $crate::repository::pool::DbPool::Sqlite(pool) => {
                let mut $conn = pool.get().await?;
                $body
            }
        }
    }};
}

#[allow(unused_imports)]
pub use with_conn;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_sqlite_prefix() {
        let pool = SqlitePool::new("sqlite:/tmp/test.db");
        assert_eq!(pool.database_url(), "/tmp/test.db");
    }
}
