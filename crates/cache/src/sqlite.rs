//! SQLite-backed [`Persistence`].

use crate::error::{ErrorKind, Result};
use crate::models::EntryRow;
use crate::{Database, Persistence, StoredEntry};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::SqlitePool;
use tracing::instrument;

/// Index storage in a SQLite database.
///
/// Values are stored as BLOBs exactly as the index's value codec produced
/// them; a `NULL` value records an extraction miss. Entries belong to their
/// index row, so an index can be wiped without touching any other.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}
impl From<&Database> for SqliteStore {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Persistence for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn version(&self, index: &str) -> Result<Option<u32>> {
        let version: Option<i64> = sqlx::query_scalar(include_str!("../queries/get_version.sql"))
            .bind(index)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        version
            .map(|v| u32::try_from(v).or_raise(|| ErrorKind::InvalidData("version")))
            .transpose()
    }

    #[instrument(skip(self))]
    async fn reset(&self, index: &str, version: u32) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let deleted = sqlx::query(include_str!("../queries/delete_entries_for_index.sql"))
            .bind(index)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/upsert_version.sql"))
            .bind(index)
            .bind(i64::from(version))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(deleted = deleted.rows_affected(), "index reset");
        Ok(())
    }

    async fn get(&self, index: &str, key: &[u8]) -> Result<Option<StoredEntry>> {
        let row: Option<EntryRow> = sqlx::query_as(include_str!("../queries/get_entry.sql"))
            .bind(index)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(StoredEntry::try_from).transpose()
    }

    async fn put(&self, index: &str, key: &[u8], entry: &StoredEntry) -> Result<()> {
        let row = EntryRow::try_from(entry)?;
        sqlx::query(include_str!("../queries/upsert_entry.sql"))
            .bind(index)
            .bind(key)
            .bind(row.modified)
            .bind(row.size)
            .bind(row.origin)
            .bind(row.value)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn remove(&self, index: &str, key: &[u8]) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/delete_entry.sql"))
            .bind(index)
            .bind(key)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_entries.sql"))
            .bind(index)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))
    }

    async fn close(&self) {
        crate::db::shutdown(&self.pool).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgdex_vfs::Fingerprint;

    const INDEX: &str = "TestIndex";

    async fn store() -> SqliteStore {
        let db = Database::connect_in_memory().await.unwrap();
        let store = SqliteStore::from(&db);
        store.reset(INDEX, 1).await.unwrap();
        store
    }

    fn entry(modified: i64, value: Option<&[u8]>) -> StoredEntry {
        StoredEntry::new(Fingerprint::new("a.png", modified, 12), value.map(<[u8]>::to_vec))
    }

    #[tokio::test]
    async fn test_version_of_unknown_index() {
        let store = store().await;
        assert_eq!(store.version("Unknown").await.unwrap(), None);
        assert_eq!(store.version(INDEX).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = store().await;
        let key = 5u32.to_be_bytes();
        assert_eq!(store.get(INDEX, &key).await.unwrap(), None);
        store.put(INDEX, &key, &entry(1, Some(&[1; 12]))).await.unwrap();
        assert_eq!(store.get(INDEX, &key).await.unwrap(), Some(entry(1, Some(&[1; 12]))));
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let store = store().await;
        let key = 5u32.to_be_bytes();
        store.put(INDEX, &key, &entry(1, Some(&[1; 12]))).await.unwrap();
        store.put(INDEX, &key, &entry(2, None)).await.unwrap();
        assert_eq!(store.get(INDEX, &key).await.unwrap(), Some(entry(2, None)));
        assert_eq!(store.count(INDEX).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = store().await;
        let key = 5u32.to_be_bytes();
        store.put(INDEX, &key, &entry(1, None)).await.unwrap();
        assert!(store.remove(INDEX, &key).await.unwrap());
        assert!(!store.remove(INDEX, &key).await.unwrap());
        assert_eq!(store.get(INDEX, &key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reset_only_touches_one_index() {
        let store = store().await;
        store.reset("Other", 7).await.unwrap();
        store.put(INDEX, &[0, 0, 0, 1], &entry(1, None)).await.unwrap();
        store.put("Other", &[0, 0, 0, 1], &entry(1, None)).await.unwrap();
        store.reset(INDEX, 2).await.unwrap();
        assert_eq!(store.version(INDEX).await.unwrap(), Some(2));
        assert_eq!(store.count(INDEX).await.unwrap(), 0);
        assert_eq!(store.count("Other").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_put_requires_registered_index() {
        let store = store().await;
        let err = store.put("Unregistered", &[0], &entry(1, None)).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Database);
    }

    #[tokio::test]
    async fn test_close_shuts_the_database_down() {
        let db = Database::connect_in_memory().await.unwrap();
        let store = SqliteStore::from(&db);
        store.close().await;
        assert!(db.pool().is_closed());
        assert!(store.count(INDEX).await.is_err());
    }

    #[tokio::test]
    async fn test_persists_across_connections() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("index.db");
        let db = Database::connect(&path).await.unwrap();
        let store = SqliteStore::from(&db);
        store.reset(INDEX, 3).await.unwrap();
        store.put(INDEX, &[0, 0, 0, 9], &entry(9, Some(&[9; 12]))).await.unwrap();
        store.close().await;

        let db = Database::connect(&path).await.unwrap();
        let store = SqliteStore::from(&db);
        assert_eq!(store.version(INDEX).await.unwrap(), Some(3));
        assert_eq!(store.get(INDEX, &[0, 0, 0, 9]).await.unwrap(), Some(entry(9, Some(&[9; 12]))));
        store.close().await;
    }
}
