//! Error types for rule definitions and repositories
//!
//! Provides error handling for:
//! - Rule validation (ids, patterns, capture references)
//! - Repository construction (duplicate ids)
//! - Rule file loading (TOML)

use std::path::PathBuf;

/// Errors raised while validating or compiling a single rule
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Rule id is empty or uses characters outside `[a-z0-9_-]`
    #[error("invalid rule id '{0}': ids use lowercase letters, digits, '-' and '_'")]
    InvalidId(String),

    /// Matcher or detector pattern does not compile
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Rewrite references a capture group the matcher does not define
    #[error("rewrite references unknown capture group '{group}'")]
    UnknownCaptureGroup { group: String },

    /// Matcher can match the empty string, which would rewrite between every byte
    #[error("pattern `{0}` matches the empty string")]
    EmptyMatch(String),

    /// Coordination contract leaves a required list or name empty
    #[error("coordination contract has no {0}")]
    EmptyContract(&'static str),
}

impl RuleError {
    /// Create invalid pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }
}

/// Errors during repository construction or loading
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Two rules share an id
    #[error("duplicate rule id: '{0}'")]
    DuplicateRuleId(String),

    /// A rule failed validation
    #[error("rule '{rule_id}' is invalid: {source}")]
    InvalidRule {
        rule_id: String,
        #[source]
        source: RuleError,
    },

    /// Contract patterns could not be built
    #[error("invalid coordination contract: {0}")]
    InvalidContract(#[source] RuleError),

    /// Rule file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rule file is not valid TOML for a repository
    #[error("failed to parse rule file{}: {message}", path_suffix(.path))]
    Parse {
        path: Option<PathBuf>,
        message: String,
    },
}

impl RepositoryError {
    /// Create invalid rule error
    pub fn invalid_rule(rule_id: impl Into<String>, source: RuleError) -> Self {
        Self::InvalidRule {
            rule_id: rule_id.into(),
            source,
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" {}", p.display()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_id_display() {
        let err = RuleError::InvalidId("Bad Id".to_string());
        assert!(err.to_string().contains("'Bad Id'"));
    }

    #[test]
    fn parse_error_display_with_and_without_path() {
        let with_path = RepositoryError::Parse {
            path: Some(PathBuf::from("rules.toml")),
            message: "expected table".to_string(),
        };
        assert_eq!(
            with_path.to_string(),
            "failed to parse rule file rules.toml: expected table"
        );

        let without = RepositoryError::Parse {
            path: None,
            message: "expected table".to_string(),
        };
        assert_eq!(without.to_string(), "failed to parse rule file: expected table");
    }

    #[test]
    fn invalid_rule_wraps_source() {
        let err = RepositoryError::invalid_rule(
            "call-x",
            RuleError::UnknownCaptureGroup {
                group: "indent".to_string(),
            },
        );
        assert!(err.to_string().starts_with("rule 'call-x' is invalid"));
    }
}
