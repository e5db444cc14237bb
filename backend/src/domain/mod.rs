//! Domain services: the month-indexed ledger, aggregation, the
//! profile/family directory, and the activity log.

pub mod activity;
pub mod family;
pub mod ledger;
pub mod summary;

pub use activity::ActivityService;
pub use family::FamilyService;
pub use ledger::LedgerService;

use thiserror::Error;

/// Failures a ledger operation can surface. None of these are fatal; the
/// caller reports them as a transient notification and stays interactive.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A mutation was attempted before a session with a family was activated.
    #[error("no active family; activate a session first")]
    NoActiveFamily,

    /// The movement store rejected a write. Local state was left untouched.
    #[error("movement store write failed")]
    Remote(#[source] anyhow::Error),

    /// Bulk load failed. The store is initialized but empty; re-activating
    /// retries the load.
    #[error("bulk load from the movement store failed")]
    Load(#[source] anyhow::Error),
}
