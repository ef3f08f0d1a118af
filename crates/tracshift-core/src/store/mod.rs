//! Read-only access to the legacy ticket store.
//!
//! The replay engine and driver only consume the [`TicketStore`] trait;
//! the SQLite implementation against the Trac schema lives in [`sqlite`].

pub mod sqlite;

pub use sqlite::SqliteTicketStore;

use std::path::PathBuf;

use crate::model::{ChangeEvent, Milestone, Ticket};

/// Errors from the legacy store. Any of these is fatal-environmental: the
/// migration cannot proceed without a readable source of truth.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot open ticket database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("ticket database query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// Read-only view of the legacy tracker.
pub trait TicketStore {
    /// All milestones, in name order.
    fn milestones(&self) -> Result<Vec<Milestone>, StoreError>;

    /// Tickets with `id >= start_at`, ascending by identifier.
    fn tickets(&self, start_at: i64) -> Result<Vec<Ticket>, StoreError>;

    /// Historical change events for one ticket, ascending by timestamp.
    fn changes(&self, ticket_id: i64) -> Result<Vec<ChangeEvent>, StoreError>;
}
