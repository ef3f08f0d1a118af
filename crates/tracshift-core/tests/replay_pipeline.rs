//! Integration tests: ticket replay pipeline (store → replay → tracker).
//!
//! Covers the critical path over an in-memory ticket store and a recording
//! mock tracker:
//!   - One issue per ticket; final title follows the last summary event
//!   - Per-category label uniqueness across replayed value sequences
//!   - Fatal ambiguity on overlapping label rules
//!   - Provenance headers for unmapped reporters
//!   - Milestone/owner skip conditions
//!   - Driver-level milestone creation, duplicate-title skipping, and
//!     cancellation

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use tracshift_core::cancel::CancelToken;
use tracshift_core::config::{Credential, LabelRuleConfig, MigrationConfig};
use tracshift_core::driver::{DriverOptions, MigrationDriver};
use tracshift_core::error::FatalError;
use tracshift_core::github::{
    ApiError, IssuePatch, IssueTracker, MilestoneInfo, MilestoneState, NewMilestone,
};
use tracshift_core::labels::RuleSet;
use tracshift_core::model::{ChangeEvent, FieldKind, Milestone, Ticket};
use tracshift_core::replay::ReplayEngine;
use tracshift_core::resolve::Resolver;
use tracshift_core::store::{StoreError, TicketStore};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Mutation {
    Create {
        actor: String,
        title: String,
        number: u64,
    },
    Update {
        actor: String,
        number: u64,
        patch: IssuePatch,
    },
    Close {
        number: u64,
    },
    Reopen {
        number: u64,
    },
    Comment {
        actor: String,
        number: u64,
        body: String,
    },
    CreateMilestone {
        title: String,
        closed: bool,
        due_on: Option<String>,
        number: u64,
    },
}

#[derive(Default)]
struct TrackerState {
    mutations: Vec<Mutation>,
    milestones: Vec<MilestoneInfo>,
    collaborators: Vec<String>,
    issue_titles: Vec<String>,
    next_issue: u64,
    next_milestone: u64,
}

/// Records every mutation; optionally trips a cancel token on issue
/// creation to simulate an interrupt mid-replay.
#[derive(Default)]
struct RecordingTracker {
    state: RefCell<TrackerState>,
    cancel_on_create: Option<CancelToken>,
}

impl RecordingTracker {
    fn with_milestone(self, title: &str, number: u64) -> Self {
        self.state.borrow_mut().milestones.push(MilestoneInfo {
            number,
            title: title.to_string(),
            open: true,
        });
        self
    }

    fn with_collaborator(self, login: &str) -> Self {
        self.state
            .borrow_mut()
            .collaborators
            .push(login.to_string());
        self
    }

    fn with_issue_title(self, title: &str) -> Self {
        self.state.borrow_mut().issue_titles.push(title.to_string());
        self
    }

    fn mutations(&self) -> Vec<Mutation> {
        self.state.borrow().mutations.clone()
    }
}

impl IssueTracker for RecordingTracker {
    fn list_milestones(&self, state: MilestoneState) -> Result<Vec<MilestoneInfo>, ApiError> {
        let milestones = &self.state.borrow().milestones;
        Ok(milestones
            .iter()
            .filter(|milestone| match state {
                MilestoneState::All => true,
                MilestoneState::Open => milestone.open,
                MilestoneState::Closed => !milestone.open,
            })
            .cloned()
            .collect())
    }

    fn list_collaborators(&self) -> Result<Vec<String>, ApiError> {
        Ok(self.state.borrow().collaborators.clone())
    }

    fn list_issue_titles(&self) -> Result<Vec<String>, ApiError> {
        Ok(self.state.borrow().issue_titles.clone())
    }

    fn create_milestone(&self, milestone: &NewMilestone) -> Result<u64, ApiError> {
        let mut state = self.state.borrow_mut();
        state.next_milestone += 1;
        let number = state.next_milestone + 100;
        state.mutations.push(Mutation::CreateMilestone {
            title: milestone.title.clone(),
            closed: milestone.closed,
            due_on: milestone.due_on.clone(),
            number,
        });
        state.milestones.push(MilestoneInfo {
            number,
            title: milestone.title.clone(),
            open: !milestone.closed,
        });
        Ok(number)
    }

    fn create_issue(&self, actor: &str, title: &str, _body: &str) -> Result<u64, ApiError> {
        let mut state = self.state.borrow_mut();
        state.next_issue += 1;
        let number = state.next_issue;
        state.mutations.push(Mutation::Create {
            actor: actor.to_string(),
            title: title.to_string(),
            number,
        });
        drop(state);

        if let Some(token) = &self.cancel_on_create {
            token.cancel();
        }
        Ok(number)
    }

    fn update_issue(&self, actor: &str, number: u64, patch: &IssuePatch) -> Result<(), ApiError> {
        self.state.borrow_mut().mutations.push(Mutation::Update {
            actor: actor.to_string(),
            number,
            patch: patch.clone(),
        });
        Ok(())
    }

    fn close_issue(&self, _actor: &str, number: u64) -> Result<(), ApiError> {
        self.state.borrow_mut().mutations.push(Mutation::Close { number });
        Ok(())
    }

    fn reopen_issue(&self, _actor: &str, number: u64) -> Result<(), ApiError> {
        self.state.borrow_mut().mutations.push(Mutation::Reopen { number });
        Ok(())
    }

    fn add_comment(&self, actor: &str, number: u64, body: &str) -> Result<(), ApiError> {
        self.state.borrow_mut().mutations.push(Mutation::Comment {
            actor: actor.to_string(),
            number,
            body: body.to_string(),
        });
        Ok(())
    }

    fn rate_limit(&self) -> (u32, u32) {
        (5_000, 5_000)
    }
}

#[derive(Default)]
struct MemoryStore {
    milestones: Vec<Milestone>,
    tickets: Vec<Ticket>,
    changes: HashMap<i64, Vec<ChangeEvent>>,
}

impl TicketStore for MemoryStore {
    fn milestones(&self) -> Result<Vec<Milestone>, StoreError> {
        Ok(self.milestones.clone())
    }

    fn tickets(&self, start_at: i64) -> Result<Vec<Ticket>, StoreError> {
        Ok(self
            .tickets
            .iter()
            .filter(|ticket| ticket.id >= start_at)
            .cloned()
            .collect())
    }

    fn changes(&self, ticket_id: i64) -> Result<Vec<ChangeEvent>, StoreError> {
        Ok(self.changes.get(&ticket_id).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn config() -> MigrationConfig {
    MigrationConfig {
        repository: "acme/widget".to_string(),
        trac_db: PathBuf::new(),
        credentials: vec![
            Credential {
                login: "migrator".to_string(),
                token: "tok".to_string(),
            },
            Credential {
                login: "alice".to_string(),
                token: "tok-alice".to_string(),
            },
        ],
        users: BTreeMap::from([
            ("Alice Smith".to_string(), "alice".to_string()),
            ("bob".to_string(), "bsmith".to_string()),
        ]),
        labels: BTreeMap::from([
            (
                "priority".to_string(),
                vec![
                    rule("^critical$", "critical"),
                    rule("^minor$", "minor"),
                ],
            ),
            (
                "type".to_string(),
                vec![rule("^defect$", "bug"), rule("^enhancement$", "feature")],
            ),
        ]),
    }
}

fn rule(pattern: &str, label: &str) -> LabelRuleConfig {
    LabelRuleConfig {
        pattern: pattern.to_string(),
        label: label.to_string(),
    }
}

fn ticket(id: i64, summary: &str, reporter: &str) -> Ticket {
    Ticket {
        id,
        summary: summary.to_string(),
        reporter: reporter.to_string(),
        created_at_us: 1_172_984_767_000_000,
        ..Ticket::default()
    }
}

fn change(ticket_id: i64, field: &str, value: &str, author: &str, ts_us: i64) -> ChangeEvent {
    ChangeEvent {
        ticket_id,
        field: FieldKind::from_raw(field),
        value: value.to_string(),
        author: author.to_string(),
        ts_us,
    }
}

fn build_resolver(tracker: &RecordingTracker, config: &MigrationConfig) -> Resolver {
    Resolver::build(tracker, config).expect("resolver builds from mock listings")
}

// ---------------------------------------------------------------------------
// Replay engine
// ---------------------------------------------------------------------------

#[test]
fn one_issue_per_ticket_with_final_title_from_last_summary_event() {
    let tracker = RecordingTracker::default();
    let cfg = config();
    let resolver = build_resolver(&tracker, &cfg);
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");
    let cancel = CancelToken::new();
    let engine = ReplayEngine::new(&tracker, &resolver, &rules, &cancel);

    let t = ticket(1, "Old title", "Alice Smith");
    let history = vec![
        change(1, "summary", "Newer title", "bob", 2_000_000_000_000_000),
        change(1, "summary", "Final title", "bob", 3_000_000_000_000_000),
    ];

    let outcome = engine.replay_ticket(&t, &history).expect("replay succeeds");

    let creates = tracker
        .mutations()
        .iter()
        .filter(|m| matches!(m, Mutation::Create { .. }))
        .count();
    assert_eq!(creates, 1, "exactly one issue per ticket");
    assert_eq!(outcome.issue.title, "Final title");
}

#[test]
fn ticket_without_summary_events_keeps_its_summary_as_title() {
    let tracker = RecordingTracker::default();
    let cfg = config();
    let resolver = build_resolver(&tracker, &cfg);
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");
    let cancel = CancelToken::new();
    let engine = ReplayEngine::new(&tracker, &resolver, &rules, &cancel);

    let t = ticket(1, "Stable title", "Alice Smith");
    let outcome = engine.replay_ticket(&t, &[]).expect("replay succeeds");
    assert_eq!(outcome.issue.title, "Stable title");
}

#[test]
fn issue_creation_acts_as_the_mapped_reporter() {
    let tracker = RecordingTracker::default();
    let cfg = config();
    let resolver = build_resolver(&tracker, &cfg);
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");
    let cancel = CancelToken::new();
    let engine = ReplayEngine::new(&tracker, &resolver, &rules, &cancel);

    // Alice Smith maps to the credentialed `alice`; strangers fall back
    // to the default actor.
    let outcome = engine
        .replay_ticket(&ticket(1, "A", "Alice Smith"), &[])
        .expect("replay succeeds");
    assert_eq!(outcome.issue.number, 1);

    engine
        .replay_ticket(&ticket(2, "B", "stranger"), &[])
        .expect("replay succeeds");

    let actors: Vec<String> = tracker
        .mutations()
        .iter()
        .filter_map(|m| match m {
            Mutation::Create { actor, .. } => Some(actor.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(actors, ["alice", "migrator"]);
}

#[test]
fn label_sequence_keeps_at_most_one_label_per_category() {
    let tracker = RecordingTracker::default();
    let cfg = config();
    let resolver = build_resolver(&tracker, &cfg);
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");
    let cancel = CancelToken::new();
    let engine = ReplayEngine::new(&tracker, &resolver, &rules, &cancel);

    let mut t = ticket(1, "Labels", "Alice Smith");
    t.priority = "critical".to_string();
    t.kind = "defect".to_string();

    let history = vec![
        change(1, "priority", "minor", "bob", 2_000_000_000_000_000),
        change(1, "priority", "critical", "bob", 3_000_000_000_000_000),
        change(1, "priority", "minor", "bob", 4_000_000_000_000_000),
    ];

    let outcome = engine.replay_ticket(&t, &history).expect("replay succeeds");

    let priority_labels = outcome
        .issue
        .labels
        .iter()
        .filter(|label| *label == "critical" || *label == "minor")
        .count();
    assert_eq!(priority_labels, 1, "old category labels are replaced");
    assert!(outcome.issue.labels.contains("minor"));
    assert!(
        outcome.issue.labels.contains("bug"),
        "other categories' labels are untouched"
    );

    // Every intermediate label patch must also satisfy the invariant.
    for mutation in tracker.mutations() {
        if let Mutation::Update { patch, .. } = mutation {
            if let Some(labels) = patch.labels {
                let priority = labels
                    .iter()
                    .filter(|l| *l == "critical" || *l == "minor")
                    .count();
                assert!(priority <= 1, "label patch violates category uniqueness: {labels:?}");
            }
        }
    }
}

#[test]
fn ambiguous_rules_abort_the_replay() {
    let tracker = RecordingTracker::default();
    let mut cfg = config();
    cfg.labels.insert(
        "priority".to_string(),
        vec![rule("^A$", "x"), rule("^A$", "y")],
    );
    let resolver = build_resolver(&tracker, &cfg);
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");
    let cancel = CancelToken::new();
    let engine = ReplayEngine::new(&tracker, &resolver, &rules, &cancel);

    let mut t = ticket(1, "Ambiguous", "Alice Smith");
    t.priority = "A".to_string();

    let err = engine.replay_ticket(&t, &[]).expect_err("must abort");
    assert!(matches!(err, FatalError::AmbiguousRule(_)));
}

#[test]
fn unmapped_reporter_description_gets_provenance_header() {
    let tracker = RecordingTracker::default();
    let cfg = config();
    let resolver = build_resolver(&tracker, &cfg);
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");
    let cancel = CancelToken::new();
    let engine = ReplayEngine::new(&tracker, &resolver, &rules, &cancel);

    let mut t = ticket(1, "Header", "ghost");
    t.description = "hello".to_string();

    engine.replay_ticket(&t, &[]).expect("replay succeeds");

    let body = tracker
        .mutations()
        .iter()
        .find_map(|m| match m {
            Mutation::Update { patch, .. } => patch.body.clone(),
            _ => None,
        })
        .expect("description update recorded");

    let mut lines = body.lines();
    assert_eq!(lines.next(), Some("**Date:** 2007-03-04T05:06:07Z"));
    assert_eq!(lines.next(), Some(""));
    assert_eq!(lines.next(), Some("**Original reporter:** ghost"));
    assert_eq!(lines.next(), Some(""));
    assert_eq!(lines.next(), Some("hello"));
}

#[test]
fn credentialed_author_description_has_no_header() {
    let tracker = RecordingTracker::default();
    let cfg = config();
    let resolver = build_resolver(&tracker, &cfg);
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");
    let cancel = CancelToken::new();
    let engine = ReplayEngine::new(&tracker, &resolver, &rules, &cancel);

    let mut t = ticket(1, "No header", "Alice Smith");
    t.description = "hello".to_string();

    engine.replay_ticket(&t, &[]).expect("replay succeeds");

    let body = tracker
        .mutations()
        .iter()
        .find_map(|m| match m {
            Mutation::Update { patch, .. } => patch.body.clone(),
            _ => None,
        })
        .expect("description update recorded");
    assert_eq!(body, "hello");
}

#[test]
fn unresolved_milestone_and_owner_are_skipped_not_fatal() {
    let tracker = RecordingTracker::default().with_collaborator("alice");
    let cfg = config();
    let resolver = build_resolver(&tracker, &cfg);
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");
    let cancel = CancelToken::new();
    let engine = ReplayEngine::new(&tracker, &resolver, &rules, &cancel);

    let t = ticket(1, "Skips", "Alice Smith");
    let history = vec![
        change(1, "milestone", "no-such-milestone", "bob", 2_000_000_000_000_000),
        // bob maps to bsmith, who is not a collaborator.
        change(1, "owner", "bob", "bob", 3_000_000_000_000_000),
        // stranger has no mapping at all.
        change(1, "owner", "stranger", "bob", 4_000_000_000_000_000),
    ];

    let outcome = engine.replay_ticket(&t, &history).expect("skips are not fatal");
    assert_eq!(outcome.skipped, 3);
    assert_eq!(outcome.issue.milestone, None);
    assert_eq!(outcome.issue.assignee, None);
    assert_eq!(outcome.mutations, 1, "only the create reached the tracker");
}

#[test]
fn owner_change_assigns_mapped_collaborator() {
    let tracker = RecordingTracker::default().with_collaborator("alice");
    let cfg = config();
    let resolver = build_resolver(&tracker, &cfg);
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");
    let cancel = CancelToken::new();
    let engine = ReplayEngine::new(&tracker, &resolver, &rules, &cancel);

    let t = ticket(1, "Assign", "Alice Smith");
    let history = vec![change(
        1,
        "owner",
        "Alice Smith",
        "bob",
        2_000_000_000_000_000,
    )];

    let outcome = engine.replay_ticket(&t, &history).expect("replay succeeds");
    assert_eq!(outcome.issue.assignee.as_deref(), Some("alice"));
}

#[test]
fn status_events_close_and_reopen_in_order() {
    let tracker = RecordingTracker::default();
    let cfg = config();
    let resolver = build_resolver(&tracker, &cfg);
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");
    let cancel = CancelToken::new();
    let engine = ReplayEngine::new(&tracker, &resolver, &rules, &cancel);

    let t = ticket(1, "Lifecycle", "Alice Smith");
    let history = vec![
        change(1, "status", "closed", "bob", 2_000_000_000_000_000),
        change(1, "status", "reopened", "bob", 3_000_000_000_000_000),
        change(1, "status", "assigned", "bob", 4_000_000_000_000_000),
        change(1, "status", "closed", "bob", 5_000_000_000_000_000),
    ];

    let outcome = engine.replay_ticket(&t, &history).expect("replay succeeds");
    assert!(!outcome.issue.open);

    let lifecycle: Vec<Mutation> = tracker
        .mutations()
        .into_iter()
        .filter(|m| matches!(m, Mutation::Close { .. } | Mutation::Reopen { .. }))
        .collect();
    assert_eq!(
        lifecycle,
        [
            Mutation::Close { number: 1 },
            Mutation::Reopen { number: 1 },
            Mutation::Close { number: 1 },
        ],
        "assigned is a no-op; close/reopen follow event order"
    );
}

#[test]
fn comments_are_translated_and_housekeeping_is_dropped() {
    let tracker = RecordingTracker::default();
    let cfg = config();
    let resolver = build_resolver(&tracker, &cfg);
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");
    let cancel = CancelToken::new();
    let engine = ReplayEngine::new(&tracker, &resolver, &rules, &cancel);

    let t = ticket(1, "Comments", "Alice Smith");
    let history = vec![
        change(1, "comment", "", "bob", 2_000_000_000_000_000),
        change(1, "comment", "Milestone v1 deleted", "bob", 3_000_000_000_000_000),
        change(1, "comment", "see '''this'''", "Alice Smith", 4_000_000_000_000_000),
    ];

    let outcome = engine.replay_ticket(&t, &history).expect("replay succeeds");
    assert_eq!(outcome.skipped, 2);

    let comments: Vec<String> = tracker
        .mutations()
        .iter()
        .filter_map(|m| match m {
            Mutation::Comment { body, .. } => Some(body.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(comments, ["see **this**"]);
}

// ---------------------------------------------------------------------------
// Migration driver
// ---------------------------------------------------------------------------

#[test]
fn driver_creates_absent_milestones_and_resolves_them_for_tickets() {
    let tracker = RecordingTracker::default().with_milestone("v1", 7);
    let cfg = config();
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");

    let mut store = MemoryStore::default();
    store.milestones = vec![
        Milestone {
            name: "v1".to_string(),
            closed: false,
            due: None,
            description: String::new(),
        },
        Milestone {
            name: "v2".to_string(),
            closed: true,
            due: Some("1172984767000000".to_string()),
            description: "next up".to_string(),
        },
    ];
    let mut t = ticket(1, "Uses v2", "Alice Smith");
    t.milestone = "v2".to_string();
    store.tickets = vec![t];

    let driver = MigrationDriver::new(
        &store,
        &tracker,
        &rules,
        CancelToken::new(),
        DriverOptions::default(),
    );
    let report = driver.run(&cfg).expect("run succeeds");

    assert_eq!(report.milestones_created, 1);
    assert_eq!(report.milestones_existing, 1);

    let mutations = tracker.mutations();
    let created: Vec<&Mutation> = mutations
        .iter()
        .filter(|m| matches!(m, Mutation::CreateMilestone { .. }))
        .collect();
    assert_eq!(created.len(), 1, "pre-existing milestones are never recreated");

    let Mutation::CreateMilestone {
        title,
        closed,
        due_on,
        number,
    } = created[0]
    else {
        unreachable!()
    };
    assert_eq!(title, "v2");
    assert!(*closed);
    assert_eq!(due_on.as_deref(), Some("2007-03-04T05:06:07Z"));

    // The ticket's milestone event must resolve to the newly created
    // milestone without another listing.
    let milestone_patch = mutations.iter().find_map(|m| match m {
        Mutation::Update { patch, .. } => patch.milestone,
        _ => None,
    });
    assert_eq!(milestone_patch, Some(*number));
}

#[test]
fn duplicate_titles_are_skipped_entirely() {
    let tracker = RecordingTracker::default().with_issue_title("Bug X");
    let cfg = config();
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");

    let mut store = MemoryStore::default();
    store.tickets = vec![ticket(1, "Bug X", "Alice Smith"), ticket(2, "Bug Y", "bob")];

    let driver = MigrationDriver::new(
        &store,
        &tracker,
        &rules,
        CancelToken::new(),
        DriverOptions {
            deduplicate: true,
            start_at: 0,
        },
    );
    let report = driver.run(&cfg).expect("run succeeds");

    assert_eq!(report.tickets_skipped, 1);
    assert_eq!(report.tickets_migrated, 1);

    let created_titles: Vec<String> = tracker
        .mutations()
        .iter()
        .filter_map(|m| match m {
            Mutation::Create { title, .. } => Some(title.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(created_titles, ["Bug Y"], "no duplicate created");
}

#[test]
fn without_deduplication_duplicate_titles_migrate() {
    let tracker = RecordingTracker::default().with_issue_title("Bug X");
    let cfg = config();
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");

    let mut store = MemoryStore::default();
    store.tickets = vec![ticket(1, "Bug X", "Alice Smith")];

    let driver = MigrationDriver::new(
        &store,
        &tracker,
        &rules,
        CancelToken::new(),
        DriverOptions::default(),
    );
    let report = driver.run(&cfg).expect("run succeeds");
    assert_eq!(report.tickets_migrated, 1);
    assert_eq!(report.tickets_skipped, 0);
}

#[test]
fn start_at_offset_resumes_from_that_ticket() {
    let tracker = RecordingTracker::default();
    let cfg = config();
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");

    let mut store = MemoryStore::default();
    store.tickets = vec![
        ticket(1, "One", "Alice Smith"),
        ticket(2, "Two", "Alice Smith"),
        ticket(3, "Three", "Alice Smith"),
    ];

    let driver = MigrationDriver::new(
        &store,
        &tracker,
        &rules,
        CancelToken::new(),
        DriverOptions {
            deduplicate: false,
            start_at: 2,
        },
    );
    let report = driver.run(&cfg).expect("run succeeds");
    assert_eq!(report.tickets_migrated, 2);

    let created_titles: Vec<String> = tracker
        .mutations()
        .iter()
        .filter_map(|m| match m {
            Mutation::Create { title, .. } => Some(title.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(created_titles, ["Two", "Three"]);
}

#[test]
fn cancellation_mid_replay_aborts_and_names_the_ticket() {
    let cancel = CancelToken::new();
    let tracker = RecordingTracker {
        cancel_on_create: Some(cancel.clone()),
        ..RecordingTracker::default()
    };
    let cfg = config();
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");

    let mut store = MemoryStore::default();
    let mut t = ticket(5, "Interrupted", "Alice Smith");
    t.description = "body".to_string();
    store.tickets = vec![t, ticket(6, "Never reached", "Alice Smith")];

    let driver = MigrationDriver::new(
        &store,
        &tracker,
        &rules,
        cancel,
        DriverOptions::default(),
    );

    let err = driver.run(&cfg).expect_err("cancellation aborts the run");
    assert!(matches!(err, FatalError::Cancelled { ticket: Some(5) }));

    // The issue already created stays on the target; no rollback, and no
    // further mutations for it or any later ticket.
    let mutations = tracker.mutations();
    assert_eq!(mutations.len(), 1);
    assert!(matches!(&mutations[0], Mutation::Create { title, .. } if title == "Interrupted"));
}

#[test]
fn ambiguous_rule_during_driver_run_is_fatal() {
    let tracker = RecordingTracker::default();
    let mut cfg = config();
    cfg.labels.insert(
        "priority".to_string(),
        vec![rule("^A$", "x"), rule("^A$", "y")],
    );
    let rules = RuleSet::compile(&cfg.labels).expect("rules compile");

    let mut store = MemoryStore::default();
    let mut t = ticket(1, "Ambiguous", "Alice Smith");
    t.priority = "A".to_string();
    store.tickets = vec![t, ticket(2, "Never reached", "Alice Smith")];

    let driver = MigrationDriver::new(
        &store,
        &tracker,
        &rules,
        CancelToken::new(),
        DriverOptions::default(),
    );

    let err = driver.run(&cfg).expect_err("ambiguity aborts the run");
    assert_eq!(err.kind(), "configuration");

    let creates = tracker
        .mutations()
        .iter()
        .filter(|m| matches!(m, Mutation::Create { .. }))
        .count();
    assert_eq!(creates, 1, "the second ticket is never migrated");
}
