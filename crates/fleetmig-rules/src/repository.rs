//! Versioned, ordered rule collections
//!
//! A [`RuleRepository`] is fixed for the duration of a run. Rules are held in
//! family order (removal, call rewrite, coordination), preserving declaration
//! order within a family.

use crate::contract::CoordinationContract;
use crate::error::RepositoryError;
use crate::rule::{Rule, RuleFamily};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Versioned set of validated rules plus the contract they migrate towards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRepository {
    version: String,
    contract: CoordinationContract,
    rules: Vec<Rule>,
}

/// On-disk layout of a rule file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    version: String,
    #[serde(default)]
    contract: CoordinationContract,
    #[serde(default)]
    rules: Vec<Rule>,
}

impl RuleRepository {
    /// Build a repository, validating every rule and the contract
    ///
    /// # Errors
    /// Returns error on duplicate ids, an invalid rule or an unusable contract
    pub fn new(
        version: impl Into<String>,
        contract: CoordinationContract,
        rules: Vec<Rule>,
    ) -> Result<Self, RepositoryError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.id()) {
                return Err(RepositoryError::DuplicateRuleId(rule.id().to_string()));
            }
            rule.validate()
                .map_err(|e| RepositoryError::invalid_rule(rule.id(), e))?;
        }

        contract
            .import_pattern()
            .and_then(|_| contract.keyed_call_pattern())
            .and_then(|_| contract.legacy_pattern())
            .map_err(RepositoryError::InvalidContract)?;

        let mut rules = rules;
        rules.sort_by_key(Rule::family);

        Ok(Self {
            version: version.into(),
            contract,
            rules,
        })
    }

    /// Repository without rules, for validation-only passes
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: "empty".to_string(),
            contract: CoordinationContract::default(),
            rules: Vec::new(),
        }
    }

    /// Parse a repository from TOML text
    ///
    /// # Errors
    /// Returns `RepositoryError::Parse` for malformed input, or any validation error
    pub fn from_toml_str(text: &str) -> Result<Self, RepositoryError> {
        Self::from_toml(text, None)
    }

    /// Load a repository from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated
    pub fn from_toml_path(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| RepositoryError::io_error(path, e))?;
        Self::from_toml(&text, Some(path))
    }

    fn from_toml(text: &str, path: Option<&Path>) -> Result<Self, RepositoryError> {
        let file: RuleFile = toml::from_str(text).map_err(|e| RepositoryError::Parse {
            path: path.map(Path::to_path_buf),
            message: e.message().to_string(),
        })?;
        Self::new(file.version, file.contract, file.rules)
    }

    /// Repository version string
    #[inline]
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Coordination contract
    #[inline]
    #[must_use]
    pub fn contract(&self) -> &CoordinationContract {
        &self.contract
    }

    /// All rules in execution order
    #[inline]
    #[must_use]
    pub fn all_rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules of one family, in declaration order
    pub fn rules_for(&self, family: RuleFamily) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.family() == family)
    }

    /// Look up a rule by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id() == id)
    }

    /// Number of rules
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if the repository holds no rules
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
