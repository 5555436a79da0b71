//! Error types for the migration runner
//!
//! Provides error handling for:
//! - Atomic file replacement
//! - Fleet configuration loading
//! - Run preconditions
//! - The per-target failure taxonomy recorded in reports

use crate::hash::ContentHash;
use crate::report::Outcome;
use fleetmig_engine::{ArityViolation, CheckName, TargetError};
use fleetmig_rules::{RepositoryError, RuleError};
use std::path::PathBuf;

/// Failure replacing a file
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// Reading back, creating or writing the temporary file failed
    #[error("io error writing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File changed on disk since it was read
    #[error("{} changed on disk since it was read (expected {expected}, found {actual})", .path.display())]
    Modified {
        path: PathBuf,
        expected: ContentHash,
        actual: ContentHash,
    },

    /// Renaming the temporary file over the original failed
    #[error("failed to replace {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WriteError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Fleet configuration could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File unreadable
    #[error("io error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not a valid fleet file
    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// Rule file failed to load
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Target list is malformed
    #[error(transparent)]
    Targets(#[from] TargetError),
}

/// A run could not start
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Target list failed validation; nothing was touched
    #[error("invalid target list: {0}")]
    InvalidTargets(#[from] TargetError),

    /// Repository contract yields no usable verification patterns
    #[error("invalid coordination contract: {0}")]
    Contract(#[source] RuleError),

    /// A site selected with `only` is not in the target list
    #[error("selected site(s) not in the target list: {}", .0.join(", "))]
    UnknownSites(Vec<String>),
}

/// Why one target did not migrate
#[derive(Debug, thiserror::Error)]
pub enum MigrationFailure {
    /// Target file could not be read
    #[error("read failed for {}: {source}", .path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rule's arity was not met; the file is unchanged
    #[error(transparent)]
    ArityViolation(ArityViolation),

    /// A rule could not be instantiated for this target
    #[error("rule '{rule_id}' cannot be instantiated: {source}")]
    InvalidRule {
        rule_id: String,
        #[source]
        source: RuleError,
    },

    /// Post-conditions failed; the file is unchanged
    #[error("verification failed: {}", join(.failed))]
    VerificationFailure { failed: Vec<CheckName> },

    /// The rewritten text could not be persisted; the file is unchanged
    #[error(transparent)]
    WriteFailure(WriteError),
}

impl MigrationFailure {
    /// Report outcome for this failure
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::ReadFailure { .. } => Outcome::ReadFailed,
            Self::ArityViolation(_) => Outcome::ArityViolation,
            Self::InvalidRule { .. } => Outcome::InvalidRule,
            Self::VerificationFailure { .. } => Outcome::VerificationFailed,
            Self::WriteFailure(_) => Outcome::WriteFailed,
        }
    }
}

impl From<fleetmig_engine::EngineError> for MigrationFailure {
    fn from(err: fleetmig_engine::EngineError) -> Self {
        match err {
            fleetmig_engine::EngineError::ArityViolation(v) => Self::ArityViolation(v),
            fleetmig_engine::EngineError::InvalidRule { rule_id, source } => {
                Self::InvalidRule { rule_id, source }
            }
        }
    }
}

fn join(checks: &[CheckName]) -> String {
    checks
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_failure_lists_checks() {
        let err = MigrationFailure::VerificationFailure {
            failed: vec![CheckName::SharedImportOnce, CheckName::CoordinationKeyed],
        };
        assert_eq!(
            err.to_string(),
            "verification failed: shared_import_once, coordination_keyed"
        );
        assert_eq!(err.outcome(), Outcome::VerificationFailed);
    }

    #[test]
    fn modified_write_display() {
        let err = WriteError::Modified {
            path: PathBuf::from("w.py"),
            expected: ContentHash::of_text("a"),
            actual: ContentHash::of_text("b"),
        };
        assert!(err.to_string().starts_with("w.py changed on disk"));
        assert_eq!(MigrationFailure::WriteFailure(err).outcome(), Outcome::WriteFailed);
    }
}
