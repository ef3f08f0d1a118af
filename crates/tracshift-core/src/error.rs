//! Run-level error taxonomy.
//!
//! Skip-level conditions (unmapped milestone, unmapped owner, unmapped
//! label value, housekeeping comments, unparseable due dates, duplicate
//! titles) are resolved locally where they are detected and logged — they
//! never surface here. Only the failures below terminate a run.

use crate::github::ApiError;
use crate::labels::AmbiguousRule;
use crate::store::StoreError;

/// Failures that abort the entire migration run.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    /// Configuration defect: more than one label rule matched a value.
    #[error("configuration error: {0}")]
    AmbiguousRule(#[from] AmbiguousRule),

    /// The legacy ticket store is unreachable or unreadable.
    #[error("ticket store failure: {0}")]
    Store(#[from] StoreError),

    /// The target tracker rejected or failed a request.
    #[error("issue tracker failure: {0}")]
    Api(#[from] ApiError),

    /// External interrupt. `ticket` names the replay in progress, if any.
    #[error("{}", cancelled_message(.ticket))]
    Cancelled { ticket: Option<i64> },
}

fn cancelled_message(ticket: &Option<i64>) -> String {
    match ticket {
        Some(id) => format!("cancelled while migrating ticket #{id}"),
        None => "cancelled before ticket replay started".to_string(),
    }
}

impl FatalError {
    /// Coarse classification for the final error log line.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AmbiguousRule(_) => "configuration",
            Self::Store(_) | Self::Api(_) => "environmental",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}
