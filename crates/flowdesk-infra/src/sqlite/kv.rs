//! SQLite key-value store implementation.
//!
//! Implements `KvStore` from `flowdesk-core` using sqlx with split read/write
//! pools. Values are opaque text; callers store JSON blobs.

use chrono::Utc;
use flowdesk_core::storage::kv_store::KvStore;
use flowdesk_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `KvStore`.
pub struct SqliteKvStore {
    pool: DatabasePool,
}

impl SqliteKvStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.map(|row| row.try_get::<String, _>("value"))
            .transpose()
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"INSERT INTO kv_store (key, value, created_at, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use flowdesk_core::report::history::{REPORT_HISTORY_KEY, ReportHistoryService};
    use flowdesk_types::report::ReportStatus;

    use super::*;
    use crate::sqlite::pool::database_url;

    async fn temp_store() -> (tempfile::TempDir, SqliteKvStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&database_url(dir.path())).await.unwrap();
        (dir, SqliteKvStore::new(pool))
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let (_dir, store) = temp_store().await;

        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "[1,2]").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("[1,2]"));

        store.set("k", "[3]").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("[3]"));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        // Removing a missing key is a no-op.
        store.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_report_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = database_url(dir.path());

        let id = {
            let pool = DatabasePool::new(&url).await.unwrap();
            let history = ReportHistoryService::new(SqliteKvStore::new(pool.clone()));
            let id = history.create_pending_report("Onboarding").await.unwrap();
            history.mark_report_failed(id, "boom").await.unwrap();
            pool.close().await;
            id
        };

        let store = Arc::new(SqliteKvStore::new(DatabasePool::new(&url).await.unwrap()));
        let history = ReportHistoryService::new(Arc::clone(&store));
        let job = history.get_report(id).await.unwrap().unwrap();
        assert_eq!(job.status, ReportStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));

        let info = history.get_storage_info().await.unwrap();
        let raw = store.get(REPORT_HISTORY_KEY).await.unwrap().unwrap();
        assert_eq!(info.size_bytes, raw.len());
    }
}
