//! Issue tracker capability interface.
//!
//! The replay engine and driver only see [`IssueTracker`]: an object-safe,
//! identity-scoped mutation surface. Every mutating call names the acting
//! login; the transport maps it to a credential (falling back to the
//! default actor). The ureq-backed implementation lives in [`rest`].

pub mod rest;

pub use rest::RestTracker;

use std::io;

/// GitHub limits issue and comment bodies; anything beyond this is
/// rejected by the API.
pub const MAX_BODY_BYTES: usize = 65_536;

/// Truncation target leaves room for the notice below the hard limit.
const TRUNCATED_BODY_BYTES: usize = 65_300;

const TRUNCATION_NOTICE: &str = "\n\n*[body truncated during migration]*";

/// Errors surfaced by an issue tracker transport.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("unexpected status {code} for {url}")]
    Status { code: u16, url: String },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: io::Error,
    },
}

/// Milestone listing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneState {
    Open,
    Closed,
    All,
}

impl MilestoneState {
    #[must_use]
    pub const fn as_query(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

/// A milestone as known to the target system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneInfo {
    pub number: u64,
    pub title: String,
    pub open: bool,
}

/// A milestone to create on the target system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMilestone {
    pub title: String,
    pub closed: bool,
    /// RFC3339 due date, already translated from the legacy value.
    pub due_on: Option<String>,
    pub description: String,
}

/// Partial issue update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuePatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub milestone: Option<u64>,
    pub assignee: Option<String>,
    pub labels: Option<Vec<String>>,
}

/// Identity-scoped issue mutation capabilities.
///
/// All operations are synchronous; the implementation is responsible for
/// respecting the target's request-rate quota by blocking the (single)
/// execution thread when quota runs low.
pub trait IssueTracker {
    fn list_milestones(&self, state: MilestoneState) -> Result<Vec<MilestoneInfo>, ApiError>;

    fn list_collaborators(&self) -> Result<Vec<String>, ApiError>;

    /// Titles of all existing issues (open and closed), for duplicate
    /// detection.
    fn list_issue_titles(&self) -> Result<Vec<String>, ApiError>;

    fn create_milestone(&self, milestone: &NewMilestone) -> Result<u64, ApiError>;

    /// Create an issue, acting as `actor`. Returns the issue number.
    fn create_issue(&self, actor: &str, title: &str, body: &str) -> Result<u64, ApiError>;

    fn update_issue(&self, actor: &str, number: u64, patch: &IssuePatch) -> Result<(), ApiError>;

    fn close_issue(&self, actor: &str, number: u64) -> Result<(), ApiError>;

    fn reopen_issue(&self, actor: &str, number: u64) -> Result<(), ApiError>;

    fn add_comment(&self, actor: &str, number: u64, body: &str) -> Result<(), ApiError>;

    /// (remaining, limit) of the request quota as last observed.
    fn rate_limit(&self) -> (u32, u32);
}

/// Target repository slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let trimmed = raw.trim();
        let Some((owner, repo)) = trimmed.split_once('/') else {
            anyhow::bail!("invalid repo slug '{trimmed}': expected <owner>/<repo>");
        };

        if owner.is_empty() || repo.is_empty() {
            anyhow::bail!("invalid repo slug '{trimmed}': expected <owner>/<repo>");
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Enforce the body size limit: oversized bodies are cut at a char
/// boundary below the truncation target and a notice is appended.
#[must_use]
pub fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_BODY_BYTES {
        return body.to_string();
    }

    let mut cut = TRUNCATED_BODY_BYTES.min(body.len());
    while cut > 0 && !body.is_char_boundary(cut) {
        cut -= 1;
    }

    let mut out = body[..cut].to_string();
    out.push_str(TRUNCATION_NOTICE);
    out
}
