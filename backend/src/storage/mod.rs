//! Storage layer: trait abstractions plus the SQLite implementations.

pub mod sqlite;
pub mod traits;

pub use sqlite::{
    DbConnection, SqliteActivitySink, SqliteDirectoryStore, SqliteMovementStore,
    SqliteSnapshotStore,
};
pub use traits::{
    ActivitySink, DirectoryStore, MovementRecord, MovementStore, MovementUpdate, NewMovement,
    SnapshotStore,
};
