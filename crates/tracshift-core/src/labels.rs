//! Rule-driven label mapping.
//!
//! Each category (priority, type, component, version, resolution) carries
//! an ordered list of (pattern, replacement-label) rules. A legacy value is
//! matched against every rule in its category: zero hits is a recoverable
//! skip, exactly one hit replaces the category's previous label, more than
//! one hit is a configuration defect and aborts the run. Removal is scoped
//! to the category — labels contributed by other categories are untouched.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::config::LabelRuleConfig;

/// More than one rule in a category matched the same value. This is an
/// ambiguous rule set, never silently resolved.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "ambiguous label rules for category '{category}': value '{value}' matched patterns {patterns:?}"
)]
pub struct AmbiguousRule {
    pub category: String,
    pub value: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone)]
struct LabelRule {
    pattern: Regex,
    label: String,
}

/// Compiled per-category rule lists.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    categories: BTreeMap<String, Vec<LabelRule>>,
}

impl RuleSet {
    /// Compile raw config rules. A pattern that fails to compile is a
    /// fatal configuration error.
    pub fn compile(raw: &BTreeMap<String, Vec<LabelRuleConfig>>) -> anyhow::Result<Self> {
        let mut categories = BTreeMap::new();

        for (category, rules) in raw {
            let mut compiled = Vec::with_capacity(rules.len());
            for rule in rules {
                let pattern = Regex::new(&rule.pattern).map_err(|err| {
                    anyhow::anyhow!(
                        "invalid label rule pattern '{}' in category '{category}': {err}",
                        rule.pattern
                    )
                })?;
                compiled.push(LabelRule {
                    pattern,
                    label: rule.label.clone(),
                });
            }
            categories.insert(category.clone(), compiled);
        }

        Ok(Self { categories })
    }

    #[must_use]
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    /// Apply one legacy value for `category` against the current label set.
    ///
    /// Returns `Ok(None)` when nothing should change: no rules configured
    /// for the category, or no pattern matched the value (logged — "no
    /// known mapping" is distinct from "field explicitly unset").
    ///
    /// On a single hit, labels matching any *miss* pattern for this
    /// category (labels it could have produced for a different value) are
    /// removed before the replacement label is added, so at most one label
    /// per category survives any replay sequence.
    pub fn apply(
        &self,
        category: &str,
        value: &str,
        current: &BTreeSet<String>,
    ) -> Result<Option<BTreeSet<String>>, AmbiguousRule> {
        let Some(rules) = self.categories.get(category) else {
            debug!(category, "no label rules configured; skipping");
            return Ok(None);
        };

        let (hits, misses): (Vec<&LabelRule>, Vec<&LabelRule>) =
            rules.iter().partition(|rule| rule.pattern.is_match(value));

        match hits.as_slice() {
            [] => {
                warn!(category, value, "no label rule matched; field left unmapped");
                Ok(None)
            }
            [hit] => {
                let mut next: BTreeSet<String> = current
                    .iter()
                    .filter(|label| !misses.iter().any(|miss| miss.pattern.is_match(label)))
                    .cloned()
                    .collect();
                next.insert(hit.label.clone());
                Ok(Some(next))
            }
            many => Err(AmbiguousRule {
                category: category.to_string(),
                value: value.to_string(),
                patterns: many.iter().map(|rule| rule.pattern.to_string()).collect(),
            }),
        }
    }
}
