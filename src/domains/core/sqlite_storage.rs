use crate::domains::core::storage::KeyValueStorage;
use crate::errors::{DbError, DbResult};
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use sqlx::SqlitePool;

/// SQLite primary result code for "database or disk is full".
const SQLITE_FULL: &str = "13";

/// `KeyValueStorage` over the `kv_store` table.
pub struct SqliteKeyValueStorage {
    pool: SqlitePool,
    capacity_bytes: Option<u64>,
}

impl SqliteKeyValueStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            capacity_bytes: None,
        }
    }

    pub fn with_capacity(pool: SqlitePool, capacity_bytes: Option<u64>) -> Self {
        Self { pool, capacity_bytes }
    }

    async fn bytes_used_excluding(&self, key: &str) -> DbResult<u64> {
        let used: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0) FROM kv_store WHERE key != ?",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await?;
        Ok(used.max(0) as u64)
    }
}

fn map_write_error(key: &str, err: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(SQLITE_FULL) {
            return DbError::QuotaExceeded { key: key.to_string() };
        }
    }
    err.into()
}

#[async_trait]
impl KeyValueStorage for SqliteKeyValueStorage {
    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        if let Some(capacity) = self.capacity_bytes {
            let others = self.bytes_used_excluding(key).await?;
            if others + value.len() as u64 > capacity {
                debug!(
                    "kv_store write to '{}' refused: {} + {} bytes exceeds capacity {}",
                    key,
                    others,
                    value.len(),
                    capacity
                );
                return Err(DbError::QuotaExceeded { key: key.to_string() });
            }
        }

        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(key, e))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db_migration::initialize_database(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn round_trips_values() {
        let storage = SqliteKeyValueStorage::new(setup_pool().await);
        assert_eq!(storage.get("entries").await.unwrap(), None);

        storage.set("entries", "[]").await.unwrap();
        storage.set("entries", "[{\"id\":\"A1\"}]").await.unwrap();
        assert_eq!(
            storage.get("entries").await.unwrap().as_deref(),
            Some("[{\"id\":\"A1\"}]")
        );

        storage.remove("entries").await.unwrap();
        assert_eq!(storage.get("entries").await.unwrap(), None);
    }

    #[tokio::test]
    async fn enforces_capacity() {
        let storage = SqliteKeyValueStorage::with_capacity(setup_pool().await, Some(8));
        storage.set("a", "1234").await.unwrap();
        storage.set("b", "1234").await.unwrap();

        let err = storage.set("c", "1").await.unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(storage.get("c").await.unwrap(), None);

        // Shrinking an existing key is always allowed.
        storage.set("a", "12").await.unwrap();
        storage.set("c", "12").await.unwrap();
    }

    #[tokio::test]
    async fn survives_reopen_of_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("gatehouse.db").display());

        {
            let pool = SqlitePoolOptions::new().max_connections(1).connect(&url).await.unwrap();
            crate::db_migration::initialize_database(&pool).await.unwrap();
            SqliteKeyValueStorage::new(pool.clone()).set("session", "{}").await.unwrap();
            pool.close().await;
        }

        let pool = SqlitePoolOptions::new().max_connections(1).connect(&url).await.unwrap();
        crate::db_migration::initialize_database(&pool).await.unwrap();
        let storage = SqliteKeyValueStorage::new(pool);
        assert_eq!(storage.get("session").await.unwrap().as_deref(), Some("{}"));
    }
}
