//! Domain records shared across the migration pipeline.
//!
//! `Ticket` and `ChangeEvent` are immutable snapshots read from the legacy
//! store; `Issue` is the in-memory projection of the GitHub issue being
//! built, owned by the replay engine for the duration of one ticket.
//! Timestamps are microsecond epoch integers throughout, matching the Trac
//! schema.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;

/// A legacy ticket: identifier, summary, reporter, creation time, and the
/// current values of the tracked fields. Empty string means unset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ticket {
    pub id: i64,
    pub summary: String,
    pub reporter: String,
    pub created_at_us: i64,
    pub description: String,
    pub owner: String,
    pub milestone: String,
    /// Trac calls this column `type`; renamed to avoid the keyword.
    pub kind: String,
    pub component: String,
    pub priority: String,
    pub version: String,
    pub resolution: String,
}

/// One timestamped field mutation in a ticket's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub ticket_id: i64,
    pub field: FieldKind,
    /// The new value the field took (old values are never needed).
    pub value: String,
    pub author: String,
    pub ts_us: i64,
}

/// The field classification driving event dispatch.
///
/// `Other` carries field names the replay does not act on, so unknown
/// history rows stay visible in debug logs instead of failing the parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Summary,
    Description,
    Owner,
    Milestone,
    Status,
    Priority,
    Type,
    Component,
    Version,
    Resolution,
    Comment,
    Keywords,
    Cc,
    Reporter,
    Other(String),
}

impl FieldKind {
    /// Map a raw Trac field name onto the dispatch category.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "summary" => Self::Summary,
            "description" => Self::Description,
            "owner" => Self::Owner,
            "milestone" => Self::Milestone,
            "status" => Self::Status,
            "priority" => Self::Priority,
            "type" => Self::Type,
            "component" => Self::Component,
            "version" => Self::Version,
            "resolution" => Self::Resolution,
            "comment" => Self::Comment,
            "keywords" => Self::Keywords,
            "cc" => Self::Cc,
            "reporter" => Self::Reporter,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Summary => "summary",
            Self::Description => "description",
            Self::Owner => "owner",
            Self::Milestone => "milestone",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::Type => "type",
            Self::Component => "component",
            Self::Version => "version",
            Self::Resolution => "resolution",
            Self::Comment => "comment",
            Self::Keywords => "keywords",
            Self::Cc => "cc",
            Self::Reporter => "reporter",
            Self::Other(name) => name,
        }
    }

    /// Label-rule category name for categorical fields, `None` otherwise.
    #[must_use]
    pub const fn label_category(&self) -> Option<&'static str> {
        match self {
            Self::Priority => Some("priority"),
            Self::Type => Some("type"),
            Self::Component => Some("component"),
            Self::Version => Some("version"),
            Self::Resolution => Some("resolution"),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A legacy milestone row. `due` keeps the raw stored value (numeric epoch
/// or free text) so the driver can decide how to translate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub name: String,
    pub closed: bool,
    pub due: Option<String>,
    pub description: String,
}

/// In-memory projection of the GitHub issue being built. Updated after
/// every successful remote mutation so the next event sees current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: BTreeSet<String>,
    pub milestone: Option<u64>,
    pub assignee: Option<String>,
    pub open: bool,
}

impl Issue {
    #[must_use]
    pub fn new(number: u64, title: &str) -> Self {
        Self {
            number,
            title: title.to_string(),
            body: String::new(),
            labels: BTreeSet::new(),
            milestone: None,
            assignee: None,
            open: true,
        }
    }
}

/// Render a microsecond epoch timestamp as RFC3339, falling back to the
/// raw number when out of range.
#[must_use]
pub fn micros_to_rfc3339(us: i64) -> String {
    DateTime::<Utc>::from_timestamp_micros(us)
        .map(|ts| ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_else(|| us.to_string())
}
