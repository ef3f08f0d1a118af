//! Migration driver.
//!
//! Top of the pipeline: create missing milestones first, then replay
//! tickets in ascending identifier order from the configured offset.
//! Execution is fully sequential — one ticket at a time, one mutation at a
//! time — so causal ordering of mutations is trivially correct.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::MigrationConfig;
use crate::error::FatalError;
use crate::github::{IssueTracker, NewMilestone};
use crate::labels::RuleSet;
use crate::markup;
use crate::model::{Milestone, micros_to_rfc3339};
use crate::replay::ReplayEngine;
use crate::resolve::Resolver;
use crate::store::TicketStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct DriverOptions {
    /// Skip tickets whose summary exactly matches an existing issue title.
    pub deduplicate: bool,
    /// First ticket identifier to migrate.
    pub start_at: i64,
}

/// Counters for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub milestones_created: usize,
    pub milestones_existing: usize,
    pub tickets_migrated: usize,
    pub tickets_skipped: usize,
    pub mutations: usize,
    pub events_skipped: usize,
}

pub struct MigrationDriver<'a> {
    store: &'a dyn TicketStore,
    tracker: &'a dyn IssueTracker,
    rules: &'a RuleSet,
    cancel: CancelToken,
    options: DriverOptions,
}

impl<'a> MigrationDriver<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn TicketStore,
        tracker: &'a dyn IssueTracker,
        rules: &'a RuleSet,
        cancel: CancelToken,
        options: DriverOptions,
    ) -> Self {
        Self {
            store,
            tracker,
            rules,
            cancel,
            options,
        }
    }

    /// Run the full migration: milestones, then tickets.
    pub fn run(&self, config: &MigrationConfig) -> Result<RunReport, FatalError> {
        let mut resolver = Resolver::build(self.tracker, config)?;
        let mut report = RunReport::default();

        self.migrate_milestones(&mut resolver, &mut report)?;
        self.migrate_tickets(&resolver, &mut report)?;

        info!(
            milestones_created = report.milestones_created,
            tickets_migrated = report.tickets_migrated,
            tickets_skipped = report.tickets_skipped,
            mutations = report.mutations,
            "migration complete"
        );
        Ok(report)
    }

    /// Create every legacy milestone absent from the target. Pre-existing
    /// milestones are never recreated.
    fn migrate_milestones(
        &self,
        resolver: &mut Resolver,
        report: &mut RunReport,
    ) -> Result<(), FatalError> {
        for milestone in self.store.milestones()? {
            if self.cancel.is_cancelled() {
                return Err(FatalError::Cancelled { ticket: None });
            }

            if resolver.milestone_number(&milestone.name).is_some() {
                debug!(name = %milestone.name, "milestone already on target; skipping");
                report.milestones_existing += 1;
                continue;
            }

            let number = self.tracker.create_milestone(&new_milestone(&milestone))?;
            info!(name = %milestone.name, number, "milestone created");
            resolver.record_milestone(&milestone.name, number);
            report.milestones_created += 1;
        }

        Ok(())
    }

    fn migrate_tickets(&self, resolver: &Resolver, report: &mut RunReport) -> Result<(), FatalError> {
        let mut known_titles: HashSet<String> = if self.options.deduplicate {
            self.tracker.list_issue_titles()?.into_iter().collect()
        } else {
            HashSet::new()
        };

        let engine = ReplayEngine::new(self.tracker, resolver, self.rules, &self.cancel);

        for ticket in self.store.tickets(self.options.start_at)? {
            if self.cancel.is_cancelled() {
                return Err(FatalError::Cancelled {
                    ticket: Some(ticket.id),
                });
            }

            if self.options.deduplicate && known_titles.contains(&ticket.summary) {
                info!(
                    ticket = ticket.id,
                    title = %ticket.summary,
                    "duplicate title on target; ticket skipped"
                );
                report.tickets_skipped += 1;
                continue;
            }

            let history = self.store.changes(ticket.id)?;
            let outcome = engine.replay_ticket(&ticket, &history)?;

            if self.options.deduplicate {
                known_titles.insert(outcome.issue.title.clone());
            }

            report.tickets_migrated += 1;
            report.mutations += outcome.mutations;
            report.events_skipped += outcome.skipped;
        }

        Ok(())
    }
}

fn new_milestone(milestone: &Milestone) -> NewMilestone {
    let due_on = milestone.due.as_deref().and_then(|raw| {
        let parsed = parse_due(raw);
        if parsed.is_none() {
            warn!(
                name = %milestone.name,
                due = raw,
                "due date not parseable; milestone created without one"
            );
        }
        parsed
    });

    NewMilestone {
        title: milestone.name.clone(),
        closed: milestone.closed,
        due_on,
        description: markup::to_markdown(&milestone.description),
    }
}

/// Translate a legacy due value — microsecond epoch integer or a handful
/// of textual forms — into RFC3339 for the target.
fn parse_due(raw: &str) -> Option<String> {
    let trimmed = raw.trim();

    if let Ok(us) = trimmed.parse::<i64>() {
        return DateTime::<Utc>::from_timestamp_micros(us)
            .map(|_| micros_to_rfc3339(us));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let at_midnight = date.and_hms_opt(0, 0, 0)?.and_utc();
        return Some(at_midnight.to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
    }

    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|ts| ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}
