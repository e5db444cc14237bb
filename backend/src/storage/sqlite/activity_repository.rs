use anyhow::Result;
use async_trait::async_trait;
use sqlx::Row;

use super::DbConnection;
use crate::storage::traits::ActivitySink;
use shared::ActivityEntry;

/// sqlx-backed activity log.
#[derive(Clone)]
pub struct SqliteActivitySink {
    connection: DbConnection,
}

impl SqliteActivitySink {
    pub fn new(connection: DbConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl ActivitySink for SqliteActivitySink {
    async fn append(&self, entry: &ActivityEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs (id, user_id, family_id, action_type, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.user_id)
        .bind(&entry.family_id)
        .bind(&entry.action_type)
        .bind(&entry.description)
        .bind(&entry.created_at)
        .execute(self.connection.pool())
        .await?;
        Ok(())
    }

    async fn list_by_family(&self, family_id: &str, limit: u32) -> Result<Vec<ActivityEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM activity_logs WHERE family_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(family_id)
        .bind(limit as i64)
        .fetch_all(self.connection.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| ActivityEntry {
                id: row.get("id"),
                user_id: row.get("user_id"),
                family_id: row.get("family_id"),
                action_type: row.get("action_type"),
                description: row.get("description"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_sink() -> SqliteActivitySink {
        let db = DbConnection::init_test()
            .await
            .expect("Failed to create test database");
        SqliteActivitySink::new(db)
    }

    fn entry(family_id: &str, created_at: &str, description: &str) -> ActivityEntry {
        ActivityEntry {
            id: shared::new_record_id(),
            user_id: "user-1".to_string(),
            family_id: family_id.to_string(),
            action_type: "add_income".to_string(),
            description: description.to_string(),
            created_at: created_at.to_string(),
        }
    }

    #[tokio::test]
    async fn entries_come_back_newest_first() {
        let sink = setup_sink().await;

        sink.append(&entry("fam-1", "2024-01-01T10:00:00+00:00", "primeira"))
            .await
            .unwrap();
        sink.append(&entry("fam-1", "2024-01-02T10:00:00+00:00", "segunda"))
            .await
            .unwrap();
        sink.append(&entry("fam-2", "2024-01-03T10:00:00+00:00", "outra família"))
            .await
            .unwrap();

        let listed = sink.list_by_family("fam-1", 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].description, "segunda");
        assert_eq!(listed[1].description, "primeira");
    }

    #[tokio::test]
    async fn limit_caps_the_page() {
        let sink = setup_sink().await;

        for day in 1..=5 {
            sink.append(&entry(
                "fam-1",
                &format!("2024-01-0{}T10:00:00+00:00", day),
                "entrada",
            ))
            .await
            .unwrap();
        }

        let listed = sink.list_by_family("fam-1", 3).await.unwrap();
        assert_eq!(listed.len(), 3);
    }
}
