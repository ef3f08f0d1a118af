//! Change replay state machine.
//!
//! Takes one ticket plus its ordered change-event log and produces the
//! final issue state by applying one remote mutation per event, in
//! timestamp order. Every mutation depends only on the issue's in-memory
//! state immediately prior, so mutations are never reordered or batched;
//! each one is awaited before the next event is processed.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::FatalError;
use crate::github::{IssuePatch, IssueTracker};
use crate::labels::RuleSet;
use crate::markup;
use crate::model::{ChangeEvent, FieldKind, Issue, Ticket};
use crate::resolve::Resolver;

/// Trac appends a housekeeping comment when a milestone is deleted; those
/// never become issue comments.
static MILESTONE_DELETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^milestone\b.*\bdeleted").expect("hard-coded pattern compiles")
});

/// Fixed synthesis order for a ticket's current field values.
const INITIAL_FIELDS: [FieldKind; 8] = [
    FieldKind::Description,
    FieldKind::Owner,
    FieldKind::Milestone,
    FieldKind::Type,
    FieldKind::Component,
    FieldKind::Priority,
    FieldKind::Version,
    FieldKind::Resolution,
];

/// What one event amounted to.
enum Applied {
    /// A remote mutation was issued.
    Mutated,
    /// A skip condition fired; logged, migration continues.
    Skipped,
    /// The field is explicitly unsupported or carries no effect.
    Ignored,
}

/// Result of replaying one ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    /// Final issue state after all events.
    pub issue: Issue,
    /// Remote mutations issued, including the initial create.
    pub mutations: usize,
    /// Events dropped by a skip condition.
    pub skipped: usize,
}

pub struct ReplayEngine<'a> {
    tracker: &'a dyn IssueTracker,
    resolver: &'a Resolver,
    rules: &'a RuleSet,
    cancel: &'a CancelToken,
}

impl<'a> ReplayEngine<'a> {
    #[must_use]
    pub const fn new(
        tracker: &'a dyn IssueTracker,
        resolver: &'a Resolver,
        rules: &'a RuleSet,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            tracker,
            resolver,
            rules,
            cancel,
        }
    }

    /// Replay one ticket into a freshly created issue.
    ///
    /// Synthesized initial events (the ticket's current field values, in
    /// fixed order, at the ticket's creation time) run first, then the
    /// historical log in ascending timestamp order.
    pub fn replay_ticket(
        &self,
        ticket: &Ticket,
        history: &[ChangeEvent],
    ) -> Result<ReplayOutcome, FatalError> {
        let reporter_actor = self.resolver.actor_for(&ticket.reporter);
        let number = self
            .tracker
            .create_issue(reporter_actor, &ticket.summary, "")?;
        info!(ticket = ticket.id, issue = number, "issue created");

        let mut issue = Issue::new(number, &ticket.summary);

        let mut events = synthesize_initial_events(ticket);
        let mut historical = history.to_vec();
        historical.sort_by_key(|event| event.ts_us);
        events.extend(historical);

        let mut mutations = 1_usize;
        let mut skipped = 0_usize;

        for event in &events {
            if self.cancel.is_cancelled() {
                return Err(FatalError::Cancelled {
                    ticket: Some(ticket.id),
                });
            }

            match self.apply_event(&mut issue, event)? {
                Applied::Mutated => mutations += 1,
                Applied::Skipped => skipped += 1,
                Applied::Ignored => {}
            }
        }

        Ok(ReplayOutcome {
            issue,
            mutations,
            skipped,
        })
    }

    fn apply_event(&self, issue: &mut Issue, event: &ChangeEvent) -> Result<Applied, FatalError> {
        let actor = self.resolver.actor_for(&event.author);

        if let Some(category) = event.field.label_category() {
            return self.apply_label_change(issue, event, category, actor);
        }

        match &event.field {
            FieldKind::Milestone => {
                let Some(milestone) = self.resolver.milestone_number(&event.value) else {
                    warn!(
                        ticket = event.ticket_id,
                        value = %event.value,
                        "milestone not found on target; skipping"
                    );
                    return Ok(Applied::Skipped);
                };

                let patch = IssuePatch {
                    milestone: Some(milestone),
                    ..IssuePatch::default()
                };
                self.tracker.update_issue(actor, issue.number, &patch)?;
                issue.milestone = Some(milestone);
                Ok(Applied::Mutated)
            }

            FieldKind::Owner => {
                let Some(login) = self.resolver.login_for(&event.value) else {
                    warn!(
                        ticket = event.ticket_id,
                        owner = %event.value,
                        "owner has no mapped login; skipping assignment"
                    );
                    return Ok(Applied::Skipped);
                };

                if !self.resolver.is_collaborator(login) {
                    warn!(
                        ticket = event.ticket_id,
                        login,
                        "mapped owner is not a collaborator; skipping assignment"
                    );
                    return Ok(Applied::Skipped);
                }

                let patch = IssuePatch {
                    assignee: Some(login.to_string()),
                    ..IssuePatch::default()
                };
                self.tracker.update_issue(actor, issue.number, &patch)?;
                issue.assignee = Some(login.to_string());
                Ok(Applied::Mutated)
            }

            FieldKind::Status => match event.value.as_str() {
                "closed" => {
                    self.tracker.close_issue(actor, issue.number)?;
                    issue.open = false;
                    Ok(Applied::Mutated)
                }
                "reopened" => {
                    self.tracker.reopen_issue(actor, issue.number)?;
                    issue.open = true;
                    Ok(Applied::Mutated)
                }
                other => {
                    debug!(ticket = event.ticket_id, status = other, "status carries no effect");
                    Ok(Applied::Ignored)
                }
            },

            FieldKind::Summary => {
                let patch = IssuePatch {
                    title: Some(event.value.clone()),
                    ..IssuePatch::default()
                };
                self.tracker.update_issue(actor, issue.number, &patch)?;
                issue.title = event.value.clone();
                Ok(Applied::Mutated)
            }

            FieldKind::Description => {
                let body = self.render_body(&event.value, &event.author, event.ts_us);
                let patch = IssuePatch {
                    body: Some(body.clone()),
                    ..IssuePatch::default()
                };
                self.tracker.update_issue(actor, issue.number, &patch)?;
                issue.body = body;
                Ok(Applied::Mutated)
            }

            FieldKind::Comment => {
                let trimmed = event.value.trim();
                if trimmed.is_empty() {
                    debug!(ticket = event.ticket_id, "empty comment; skipping");
                    return Ok(Applied::Skipped);
                }
                if MILESTONE_DELETED.is_match(trimmed) {
                    debug!(ticket = event.ticket_id, "milestone housekeeping comment; skipping");
                    return Ok(Applied::Skipped);
                }

                let body = self.render_body(&event.value, &event.author, event.ts_us);
                self.tracker.add_comment(actor, issue.number, &body)?;
                Ok(Applied::Mutated)
            }

            FieldKind::Keywords | FieldKind::Cc | FieldKind::Reporter => {
                debug!(ticket = event.ticket_id, field = %event.field, "unsupported field");
                Ok(Applied::Ignored)
            }

            FieldKind::Other(name) => {
                debug!(ticket = event.ticket_id, field = %name, "unknown field ignored");
                Ok(Applied::Ignored)
            }

            // Handled above via label_category().
            FieldKind::Priority
            | FieldKind::Type
            | FieldKind::Component
            | FieldKind::Version
            | FieldKind::Resolution => Ok(Applied::Ignored),
        }
    }

    fn apply_label_change(
        &self,
        issue: &mut Issue,
        event: &ChangeEvent,
        category: &str,
        actor: &str,
    ) -> Result<Applied, FatalError> {
        let Some(next) = self.rules.apply(category, &event.value, &issue.labels)? else {
            return Ok(Applied::Skipped);
        };

        let patch = IssuePatch {
            labels: Some(next.iter().cloned().collect()),
            ..IssuePatch::default()
        };
        self.tracker.update_issue(actor, issue.number, &patch)?;
        issue.labels = next;
        Ok(Applied::Mutated)
    }

    /// Translate markup and, for authors without their own credential,
    /// prepend the provenance header.
    fn render_body(&self, raw: &str, author: &str, ts_us: i64) -> String {
        let body = markup::to_markdown(raw);
        if self.resolver.has_credential_for(author) {
            return body;
        }

        markup::with_provenance(
            &body,
            author,
            self.resolver.profile_url(author).as_deref(),
            Some(ts_us),
        )
    }
}

/// Synthesize initial change events for a ticket's current field values:
/// fixed field order, all timestamped at the ticket's creation time,
/// authored by the reporter. Unset (empty) fields produce no event.
#[must_use]
pub fn synthesize_initial_events(ticket: &Ticket) -> Vec<ChangeEvent> {
    INITIAL_FIELDS
        .iter()
        .filter_map(|field| {
            let value = match field {
                FieldKind::Description => &ticket.description,
                FieldKind::Owner => &ticket.owner,
                FieldKind::Milestone => &ticket.milestone,
                FieldKind::Type => &ticket.kind,
                FieldKind::Component => &ticket.component,
                FieldKind::Priority => &ticket.priority,
                FieldKind::Version => &ticket.version,
                FieldKind::Resolution => &ticket.resolution,
                _ => return None,
            };

            if value.is_empty() {
                return None;
            }

            Some(ChangeEvent {
                ticket_id: ticket.id,
                field: field.clone(),
                value: value.clone(),
                author: ticket.reporter.clone(),
                ts_us: ticket.created_at_us,
            })
        })
        .collect()
}
