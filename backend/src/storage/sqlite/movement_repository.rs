use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use super::DbConnection;
use crate::storage::traits::{MovementRecord, MovementStore, MovementUpdate, NewMovement};
use shared::MovementKind;

/// sqlx-backed movement store. This is the "remote record store" the ledger
/// consumes: an id-keyed relation filterable by family.
#[derive(Clone)]
pub struct SqliteMovementStore {
    connection: DbConnection,
}

impl SqliteMovementStore {
    pub fn new(connection: DbConnection) -> Self {
        Self { connection }
    }

    fn record_from_row(row: &SqliteRow) -> Result<MovementRecord> {
        let kind_label: String = row.get("type");
        let kind = MovementKind::parse(&kind_label)
            .ok_or_else(|| anyhow!("unknown movement type '{}'", kind_label))?;

        Ok(MovementRecord {
            id: row.get("id"),
            user_id: row.get("user_id"),
            family_id: row.get("family_id"),
            kind,
            amount: row.get("amount"),
            date: row.get("date"),
            person_name: row.get("person_name"),
            name: row.get("name"),
            category: row.get("category"),
            status: row.get("status"),
            target_amount: row.get("target_amount"),
            target_month: row.get::<Option<i64>, _>("target_month").map(|m| m as u32),
            target_year: row.get::<Option<i64>, _>("target_year").map(|y| y as i32),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl MovementStore for SqliteMovementStore {
    async fn insert(&self, movement: NewMovement) -> Result<MovementRecord> {
        let id = shared::new_record_id();
        let created_at = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO movements
                (id, user_id, family_id, type, amount, date, person_name,
                 name, category, status, target_amount, target_month, target_year, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&movement.user_id)
        .bind(&movement.family_id)
        .bind(movement.kind.as_str())
        .bind(movement.amount)
        .bind(&movement.date)
        .bind(&movement.person_name)
        .bind(&movement.name)
        .bind(&movement.category)
        .bind(&movement.status)
        .bind(movement.target_amount)
        .bind(movement.target_month.map(|m| m as i64))
        .bind(movement.target_year.map(|y| y as i64))
        .bind(&created_at)
        .execute(self.connection.pool())
        .await?;

        Ok(MovementRecord {
            id,
            user_id: movement.user_id,
            family_id: movement.family_id,
            kind: movement.kind,
            amount: movement.amount,
            date: movement.date,
            person_name: movement.person_name,
            name: movement.name,
            category: movement.category,
            status: movement.status,
            target_amount: movement.target_amount,
            target_month: movement.target_month,
            target_year: movement.target_year,
            created_at,
        })
    }

    async fn update(&self, id: &str, fields: MovementUpdate) -> Result<()> {
        // Absent fields keep their stored value; a non-matching id updates
        // zero rows, which is not an error.
        sqlx::query(
            r#"
            UPDATE movements SET
                amount = COALESCE(?, amount),
                date = COALESCE(?, date),
                person_name = COALESCE(?, person_name),
                name = COALESCE(?, name),
                category = COALESCE(?, category),
                status = COALESCE(?, status),
                target_amount = COALESCE(?, target_amount),
                target_month = COALESCE(?, target_month),
                target_year = COALESCE(?, target_year)
            WHERE id = ?
            "#,
        )
        .bind(fields.amount)
        .bind(&fields.date)
        .bind(&fields.person_name)
        .bind(&fields.name)
        .bind(&fields.category)
        .bind(&fields.status)
        .bind(fields.target_amount)
        .bind(fields.target_month.map(|m| m as i64))
        .bind(fields.target_year.map(|y| y as i64))
        .bind(id)
        .execute(self.connection.pool())
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM movements WHERE id = ?")
            .bind(id)
            .execute(self.connection.pool())
            .await?;
        Ok(())
    }

    async fn list_by_family(&self, family_id: &str) -> Result<Vec<MovementRecord>> {
        let rows = sqlx::query("SELECT * FROM movements WHERE family_id = ? ORDER BY date ASC")
            .bind(family_id)
            .fetch_all(self.connection.pool())
            .await?;

        rows.iter().map(Self::record_from_row).collect()
    }
}
