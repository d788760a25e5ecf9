//! SQLite pool setup for the index cache.

use exn::ResultExt;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

static SCHEMA: Migrator = sqlx::migrate!("./migrations");

// Lookups vastly outnumber writes; readers never block each other under WAL.
const POOL_SIZE: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);
// Per connection, in KiB (negative means KiB rather than pages).
const PAGE_CACHE_KIB: i64 = 4096;

#[derive(Debug)]
enum Location {
    File(PathBuf),
    Memory,
}
impl Location {
    fn options(&self) -> SqliteConnectOptions {
        let options = SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            // A bulk scan funnels many small upserts through one writer.
            .busy_timeout(BUSY_TIMEOUT)
            .pragma("cache_size", format!("-{PAGE_CACHE_KIB}"))
            .pragma("temp_store", "MEMORY");
        match self {
            Self::File(path) => options.filename(path).create_if_missing(true),
            Self::Memory => options.filename(":memory:"),
        }
    }

    fn pool_size(&self) -> u32 {
        match self {
            Self::File(_) => POOL_SIZE,
            // Each connection to ":memory:" sees a private database.
            Self::Memory => 1,
        }
    }
}

/// Pooled handle to the SQLite file holding persisted index entries.
///
/// The database is disposable: deleting it only means every file gets
/// extracted again the next time it is looked at.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file at `path` and bring its
    /// schema up to date.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(Location::File(path.as_ref().to_path_buf())).await
    }

    /// Open a private in-memory database, mostly useful in tests of
    /// downstream crates.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::open(Location::Memory).await
    }

    #[instrument("opening index database", skip_all, fields(location = ?location))]
    async fn open(location: Location) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(location.pool_size())
            .connect_with(location.options())
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.apply_schema().await?;
        Ok(db)
    }

    async fn apply_schema(&self) -> Result<()> {
        SCHEMA.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        shutdown(&self.pool).await;
    }
}

/// Let SQLite refresh its planner statistics, then drain and close the pool.
pub(crate) async fn shutdown(pool: &SqlitePool) {
    if let Err(error) = sqlx::query("PRAGMA optimize").execute(pool).await {
        tracing::debug!(%error, "skipping optimize on close");
    }
    pool.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pragma(db: &Database, name: &str) -> i64 {
        let (value,): (i64,) = sqlx::query_as(&format!("PRAGMA {name}")).fetch_one(db.pool()).await.unwrap();
        value
    }

    #[tokio::test]
    async fn test_memory_database_closes() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(!db.pool().is_closed());
        db.close().await;
        assert!(db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_file_is_created_on_connect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        assert!(!path.exists());
        let db = Database::connect(&path).await.unwrap();
        assert!(path.exists());
        db.close().await;
    }

    #[tokio::test]
    async fn test_schema_reapplies_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        Database::connect(&path).await.unwrap().close().await;
        let db = Database::connect(&path).await.unwrap();
        db.apply_schema().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_connection_settings() {
        let db = Database::connect_in_memory().await.unwrap();
        assert_eq!(pragma(&db, "foreign_keys").await, 1);
        assert_eq!(pragma(&db, "cache_size").await, -PAGE_CACHE_KIB);
        // 2 = MEMORY
        assert_eq!(pragma(&db, "temp_store").await, 2);
        db.close().await;
    }
}
