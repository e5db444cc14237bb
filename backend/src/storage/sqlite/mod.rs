//! SQLite implementations of the storage traits, backed by sqlx.

mod activity_repository;
mod directory_repository;
mod movement_repository;
mod snapshot_repository;

pub use activity_repository::SqliteActivitySink;
pub use directory_repository::SqliteDirectoryStore;
pub use movement_repository::SqliteMovementStore;
pub use snapshot_repository::SqliteSnapshotStore;

use anyhow::Result;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::sync::Arc;

// The database URL for the production database
const DATABASE_URL: &str = "sqlite:budget.db";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS movements (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        family_id TEXT NOT NULL,
        type TEXT NOT NULL,
        amount REAL NOT NULL,
        date TEXT NOT NULL,
        person_name TEXT NOT NULL,
        name TEXT,
        category TEXT,
        status TEXT,
        target_amount REAL,
        target_month INTEGER,
        target_year INTEGER,
        created_at TEXT NOT NULL
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_movements_family ON movements (family_id);",
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        family_id TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS families (
        id TEXT PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS activity_logs (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        family_id TEXT NOT NULL,
        action_type TEXT NOT NULL,
        description TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS snapshots (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    "#,
];

/// DbConnection manages the SQLite pool shared by every repository.
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection, creating the database and schema
    /// if they do not exist yet.
    pub async fn new(url: &str) -> Result<Self> {
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        let pool = SqlitePool::connect(url).await?;
        Self::setup_schema(&pool).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Initialize the standard database
    pub async fn init() -> Result<Self> {
        Self::new(DATABASE_URL).await
    }

    /// Initialize a test database with a unique name
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(pool).await?;
        }
        Ok(())
    }

    /// Get the underlying SQLite pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::SnapshotStore;

    #[tokio::test]
    async fn creates_a_file_database_with_its_schema() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let url = format!("sqlite:{}/budget.db", dir.path().display());

        let db = DbConnection::new(&url).await.expect("first connect failed");
        let snapshots = SqliteSnapshotStore::new(db);
        snapshots.store("ledger::fam-1", "[]").await.unwrap();

        // reconnecting to the same file keeps the data; schema setup is
        // idempotent
        let db = DbConnection::new(&url).await.expect("second connect failed");
        let snapshots = SqliteSnapshotStore::new(db);
        assert_eq!(
            snapshots.load("ledger::fam-1").await.unwrap().as_deref(),
            Some("[]")
        );
    }
}
