use anyhow::Result;
use async_trait::async_trait;
use sqlx::Row;

use super::DbConnection;
use crate::storage::traits::SnapshotStore;

/// Key/value blob store used as the ledger's local durable cache.
/// Each write fully replaces the blob under its key.
#[derive(Clone)]
pub struct SqliteSnapshotStore {
    connection: DbConnection,
}

impl SqliteSnapshotStore {
    pub fn new(connection: DbConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM snapshots WHERE key = ?")
            .bind(key)
            .fetch_optional(self.connection.pool())
            .await?;

        Ok(row.map(|r| r.get("value")))
    }

    async fn store(&self, key: &str, blob: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO snapshots (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(blob)
            .execute(self.connection.pool())
            .await?;
        Ok(())
    }
}
