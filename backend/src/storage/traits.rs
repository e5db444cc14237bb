//! # Storage Traits
//!
//! Abstractions the domain layer talks to instead of concrete backends.
//! The movements relation is a plain id-keyed CRUD table filterable by
//! family; any store honoring that contract (SQL, REST, ...) plugs in here.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{ActivityEntry, Family, MovementKind, Profile};

/// One row of the movements relation. The `kind` discriminator decides which
/// ledger collection the row maps to and which optional columns are
/// meaningful (e.g. `target_amount` for goals and allowances).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: String,
    pub user_id: String,
    pub family_id: String,
    #[serde(rename = "type")]
    pub kind: MovementKind,
    pub amount: f64,
    /// ISO-8601 timestamp; parsed into (month, year) during bulk load
    pub date: String,
    pub person_name: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub target_amount: Option<f64>,
    /// Zero-based month, 0..=11
    pub target_month: Option<u32>,
    pub target_year: Option<i32>,
    pub created_at: String,
}

/// Insert payload; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovement {
    pub user_id: String,
    pub family_id: String,
    pub kind: MovementKind,
    pub amount: f64,
    pub date: String,
    pub person_name: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub target_amount: Option<f64>,
    pub target_month: Option<u32>,
    pub target_year: Option<i32>,
}

/// Partial update by id. `None` fields keep their stored value; different
/// entity kinds touch different subsets of columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementUpdate {
    pub amount: Option<f64>,
    pub date: Option<String>,
    pub person_name: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub target_amount: Option<f64>,
    pub target_month: Option<u32>,
    pub target_year: Option<i32>,
}

/// The remote record store behind the ledger. Schema enforcement
/// (uniqueness, referential integrity) is the store's problem, not ours.
#[async_trait]
pub trait MovementStore: Send + Sync {
    /// Insert a movement; the returned record carries the assigned id.
    async fn insert(&self, movement: NewMovement) -> Result<MovementRecord>;

    /// Update the row with the given id. Updating an id that does not exist
    /// is not an error (the relation simply matches zero rows).
    async fn update(&self, id: &str, fields: MovementUpdate) -> Result<()>;

    /// Hard-delete by id. Deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// All movements belonging to one family, oldest first.
    async fn list_by_family(&self, family_id: &str) -> Result<Vec<MovementRecord>>;
}

/// Directory of profiles and families backing the identity snapshot.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn insert_family(&self, family: &Family) -> Result<()>;

    async fn find_family(&self, family_id: &str) -> Result<Option<Family>>;

    async fn find_family_by_code(&self, code: &str) -> Result<Option<Family>>;

    async fn insert_profile(&self, profile: &Profile) -> Result<()>;

    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>>;

    /// Full replacement of the profile row with the matching id.
    async fn update_profile(&self, profile: &Profile) -> Result<()>;
}

/// Append-only audit sink. Callers treat failures as non-fatal.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn append(&self, entry: &ActivityEntry) -> Result<()>;

    /// Most recent entries first.
    async fn list_by_family(&self, family_id: &str, limit: u32) -> Result<Vec<ActivityEntry>>;
}

/// Key/value blob cache for ledger snapshots. A missing key reads as `None`;
/// corrupt blobs are the caller's problem to detect (they deserialize).
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>>;

    async fn store(&self, key: &str, blob: &str) -> Result<()>;
}
