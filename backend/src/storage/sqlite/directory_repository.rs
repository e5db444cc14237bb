use anyhow::Result;
use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use super::DbConnection;
use crate::storage::traits::DirectoryStore;
use shared::{Family, Profile};

/// sqlx-backed directory of profiles and families.
#[derive(Clone)]
pub struct SqliteDirectoryStore {
    connection: DbConnection,
}

impl SqliteDirectoryStore {
    pub fn new(connection: DbConnection) -> Self {
        Self { connection }
    }

    fn family_from_row(row: &SqliteRow) -> Family {
        Family {
            id: row.get("id"),
            code: row.get("code"),
            created_at: row.get("created_at"),
        }
    }

    fn profile_from_row(row: &SqliteRow) -> Profile {
        Profile {
            id: row.get("id"),
            name: row.get("name"),
            family_id: row.get("family_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl DirectoryStore for SqliteDirectoryStore {
    async fn insert_family(&self, family: &Family) -> Result<()> {
        sqlx::query("INSERT INTO families (id, code, created_at) VALUES (?, ?, ?)")
            .bind(&family.id)
            .bind(&family.code)
            .bind(&family.created_at)
            .execute(self.connection.pool())
            .await?;
        Ok(())
    }

    async fn find_family(&self, family_id: &str) -> Result<Option<Family>> {
        let row = sqlx::query("SELECT * FROM families WHERE id = ?")
            .bind(family_id)
            .fetch_optional(self.connection.pool())
            .await?;
        Ok(row.as_ref().map(Self::family_from_row))
    }

    async fn find_family_by_code(&self, code: &str) -> Result<Option<Family>> {
        let row = sqlx::query("SELECT * FROM families WHERE code = ?")
            .bind(code)
            .fetch_optional(self.connection.pool())
            .await?;
        Ok(row.as_ref().map(Self::family_from_row))
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query(
            "INSERT INTO profiles (id, name, family_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&profile.id)
        .bind(&profile.name)
        .bind(&profile.family_id)
        .bind(&profile.created_at)
        .bind(&profile.updated_at)
        .execute(self.connection.pool())
        .await?;
        Ok(())
    }

    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.connection.pool())
            .await?;
        Ok(row.as_ref().map(Self::profile_from_row))
    }

    async fn update_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query("UPDATE profiles SET name = ?, family_id = ?, updated_at = ? WHERE id = ?")
            .bind(&profile.name)
            .bind(&profile.family_id)
            .bind(&profile.updated_at)
            .bind(&profile.id)
            .execute(self.connection.pool())
            .await?;
        Ok(())
    }
}
