//! Identity and milestone resolution.
//!
//! Built once before replay begins from two target-side listings (existing
//! milestones, collaborators) and the static identity map from config.
//! Everything afterwards is a pure in-memory lookup — no repeated remote
//! calls during replay.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::config::MigrationConfig;
use crate::github::{ApiError, IssueTracker, MilestoneState};

pub struct Resolver {
    milestones: HashMap<String, u64>,
    collaborators: HashSet<String>,
    users: HashMap<String, String>,
    actors: HashSet<String>,
    default_actor: String,
}

impl Resolver {
    /// Query the target once for milestones (open and closed) and
    /// collaborators, and capture the configured identity map.
    pub fn build(tracker: &dyn IssueTracker, config: &MigrationConfig) -> Result<Self, ApiError> {
        let milestones: HashMap<String, u64> = tracker
            .list_milestones(MilestoneState::All)?
            .into_iter()
            .map(|milestone| (milestone.title, milestone.number))
            .collect();

        let collaborators: HashSet<String> =
            tracker.list_collaborators()?.into_iter().collect();

        let actors: HashSet<String> = config
            .credentials
            .iter()
            .map(|cred| cred.login.clone())
            .collect();

        debug!(
            milestones = milestones.len(),
            collaborators = collaborators.len(),
            actors = actors.len(),
            "resolver built"
        );

        Ok(Self {
            milestones,
            collaborators,
            users: config.users.clone().into_iter().collect(),
            actors,
            default_actor: config.default_login().to_string(),
        })
    }

    /// Target milestone number for an exact legacy name match.
    #[must_use]
    pub fn milestone_number(&self, name: &str) -> Option<u64> {
        self.milestones.get(name).copied()
    }

    /// Record a milestone created during this run so later events resolve
    /// it without another listing.
    pub fn record_milestone(&mut self, name: &str, number: u64) {
        self.milestones.insert(name.to_string(), number);
    }

    #[must_use]
    pub fn is_collaborator(&self, login: &str) -> bool {
        self.collaborators.contains(login)
    }

    /// GitHub login mapped for a legacy author, if any.
    #[must_use]
    pub fn login_for(&self, author: &str) -> Option<&str> {
        self.users.get(author).map(String::as_str)
    }

    /// The login that performs mutations on behalf of `author`: the
    /// author's own mapped login when it has a credential, otherwise the
    /// default actor.
    #[must_use]
    pub fn actor_for(&self, author: &str) -> &str {
        match self.login_for(author) {
            Some(login) if self.actors.contains(login) => login,
            _ => &self.default_actor,
        }
    }

    /// Whether mutations by `author` carry their own identity (and so need
    /// no provenance header).
    #[must_use]
    pub fn has_credential_for(&self, author: &str) -> bool {
        self.login_for(author)
            .is_some_and(|login| self.actors.contains(login))
    }

    /// Profile URL for a mapped author, for provenance headers.
    #[must_use]
    pub fn profile_url(&self, author: &str) -> Option<String> {
        self.login_for(author)
            .map(|login| format!("https://github.com/{login}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> Resolver {
        Resolver {
            milestones: HashMap::from([("v1".to_string(), 3)]),
            collaborators: HashSet::from(["alice".to_string()]),
            users: HashMap::from([
                ("Alice Smith".to_string(), "alice".to_string()),
                ("bob".to_string(), "bsmith".to_string()),
            ]),
            actors: HashSet::from(["migrator".to_string(), "alice".to_string()]),
            default_actor: "migrator".to_string(),
        }
    }

    #[test]
    fn milestone_lookup_is_exact_name_match() {
        let resolver = resolver();
        assert_eq!(resolver.milestone_number("v1"), Some(3));
        assert_eq!(resolver.milestone_number("V1"), None);
        assert_eq!(resolver.milestone_number("v2"), None);
    }

    #[test]
    fn recorded_milestones_resolve_afterwards() {
        let mut resolver = resolver();
        assert_eq!(resolver.milestone_number("v2"), None);
        resolver.record_milestone("v2", 9);
        assert_eq!(resolver.milestone_number("v2"), Some(9));
    }

    #[test]
    fn mapped_author_with_credential_acts_as_themselves() {
        let resolver = resolver();
        assert_eq!(resolver.actor_for("Alice Smith"), "alice");
        assert!(resolver.has_credential_for("Alice Smith"));
    }

    #[test]
    fn mapped_author_without_credential_falls_back_to_default() {
        let resolver = resolver();
        // bob maps to bsmith, but bsmith has no credential.
        assert_eq!(resolver.actor_for("bob"), "migrator");
        assert!(!resolver.has_credential_for("bob"));
        assert_eq!(
            resolver.profile_url("bob").as_deref(),
            Some("https://github.com/bsmith")
        );
    }

    #[test]
    fn unmapped_author_is_external() {
        let resolver = resolver();
        assert_eq!(resolver.login_for("stranger"), None);
        assert_eq!(resolver.actor_for("stranger"), "migrator");
        assert!(resolver.profile_url("stranger").is_none());
    }
}
