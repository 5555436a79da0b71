//! Error types for targets and the transformation engine

use crate::report::MatchReport;
use fleetmig_rules::{Arity, RuleError};
use std::path::PathBuf;

/// Malformed or conflicting target descriptors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    /// Site id is empty or not `[a-z0-9_]+`
    #[error("invalid site id '{0}': use lowercase letters, digits and '_'")]
    InvalidSiteId(String),

    /// Base URL is not an http(s) URL
    #[error("target '{site_id}' has invalid base url '{base_url}'")]
    InvalidBaseUrl { site_id: String, base_url: String },

    /// Location is empty
    #[error("target '{0}' has an empty location")]
    EmptyLocation(String),

    /// Two targets share a site id
    #[error("duplicate site id: '{0}'")]
    DuplicateSiteId(String),

    /// Two targets share a location
    #[error("duplicate target location: {}", .0.display())]
    DuplicateLocation(PathBuf),
}

/// A rule matched a number of times its arity does not admit
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rule '{rule_id}' expects {arity} match(es) but found {observed}")]
pub struct ArityViolation {
    /// Offending rule
    pub rule_id: String,
    /// Declared arity
    pub arity: Arity,
    /// Matches found in the text as it stood when the rule ran
    pub observed: usize,
    /// Rules processed before the violation
    pub report: MatchReport,
}

/// Why the engine stopped
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Arity check failed; the text is left untouched
    #[error(transparent)]
    ArityViolation(#[from] ArityViolation),

    /// A rule could not be compiled for this target's parameters
    #[error("rule '{rule_id}' cannot be instantiated for this target: {source}")]
    InvalidRule {
        rule_id: String,
        #[source]
        source: RuleError,
    },
}

impl EngineError {
    /// Create invalid rule error
    pub fn invalid_rule(rule_id: impl Into<String>, source: RuleError) -> Self {
        Self::InvalidRule {
            rule_id: rule_id.into(),
            source,
        }
    }

    /// The arity violation, if that is what stopped the engine
    #[must_use]
    pub fn as_arity_violation(&self) -> Option<&ArityViolation> {
        match self {
            Self::ArityViolation(v) => Some(v),
            Self::InvalidRule { .. } => None,
        }
    }
}
