//! Per-rule match report

use fleetmig_rules::{Rule, RuleFamily};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a rule did to one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// Matched and rewrote
    Applied,
    /// No match
    NoMatch,
    /// No match, but the migrated shape is present
    AlreadyApplied,
    /// Gated off by target flags
    Skipped,
}

impl RuleStatus {
    /// Stable snake_case name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::NoMatch => "no_match",
            Self::AlreadyApplied => "already_applied",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatch {
    /// Rule family
    pub family: RuleFamily,
    /// Matches in the text as it stood when the rule ran
    pub count: usize,
    /// Status
    pub status: RuleStatus,
}

/// Rule id to outcome, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchReport {
    rules: IndexMap<String, RuleMatch>,
}

impl MatchReport {
    /// Record a rule's outcome
    pub fn record(&mut self, rule: &Rule, count: usize, status: RuleStatus) {
        self.rules.insert(
            rule.id().to_string(),
            RuleMatch {
                family: rule.family(),
                count,
                status,
            },
        );
    }

    /// Outcome of one rule
    #[must_use]
    pub fn get(&self, rule_id: &str) -> Option<&RuleMatch> {
        self.rules.get(rule_id)
    }

    /// Match count of one rule, zero if it never ran
    #[must_use]
    pub fn count(&self, rule_id: &str) -> usize {
        self.get(rule_id).map_or(0, |m| m.count)
    }

    /// Entries in execution order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuleMatch)> {
        self.rules.iter().map(|(id, m)| (id.as_str(), m))
    }

    /// Total matches of one family
    #[must_use]
    pub fn family_total(&self, family: RuleFamily) -> usize {
        self.rules
            .values()
            .filter(|m| m.family == family)
            .map(|m| m.count)
            .sum()
    }

    /// Total matches across all rules
    #[must_use]
    pub fn total(&self) -> usize {
        self.rules.values().map(|m| m.count).sum()
    }

    /// Number of recorded rules
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if no rule was recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
