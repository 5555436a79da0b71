//! Migration reports
//!
//! One [`TargetReport`] per processed target, gathered into an
//! [`AggregateReport`] per run. Reports are built while a target is processed
//! and only read afterwards.

use crate::error::MigrationFailure;
use crate::hash::ContentHash;
use chrono::{DateTime, Utc};
use fleetmig_engine::{CheckResult, Diagnostic, MatchReport, TargetDescriptor};
use fleetmig_rules::Arity;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::path::PathBuf;
use uuid::Uuid;

/// Final state of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Rewritten text verified and written (or would be, in a dry run)
    Success,
    /// Rules produced no change; nothing written
    NoChangesNeeded,
    /// Rewritten text failed a check; file unchanged
    VerificationFailed,
    /// Replacing the file failed; file unchanged
    WriteFailed,
    /// File could not be read
    ReadFailed,
    /// A rule's arity was not met; file unchanged
    ArityViolation,
    /// A rule could not be instantiated for the target
    InvalidRule,
}

impl Outcome {
    /// All outcomes, in summary order
    pub const ALL: [Outcome; 7] = [
        Outcome::Success,
        Outcome::NoChangesNeeded,
        Outcome::VerificationFailed,
        Outcome::WriteFailed,
        Outcome::ReadFailed,
        Outcome::ArityViolation,
        Outcome::InvalidRule,
    ];

    /// Stable snake_case name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NoChangesNeeded => "no_changes_needed",
            Self::VerificationFailed => "verification_failed",
            Self::WriteFailed => "write_failed",
            Self::ReadFailed => "read_failed",
            Self::ArityViolation => "arity_violation",
            Self::InvalidRule => "invalid_rule",
        }
    }

    /// Anything but `success` and `no_changes_needed`
    #[inline]
    #[must_use]
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Success | Self::NoChangesNeeded)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Offending rule of an arity violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArityDetail {
    /// Rule id
    pub rule_id: String,
    /// Declared arity
    pub arity: Arity,
    /// Matches found
    pub observed: usize,
}

/// What happened to one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReport {
    /// Site id
    pub site_id: String,
    /// Worker file path
    pub location: PathBuf,
    /// Final state
    pub outcome: Outcome,
    /// Whether the file was replaced
    pub written: bool,
    /// Per-rule counts and statuses, up to the violation if there was one
    pub rules: MatchReport,
    /// Failed verification checks with their findings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_checks: Vec<CheckResult>,
    /// Offending rule, for arity violations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arity_violation: Option<ArityDetail>,
    /// Error detail for failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Hash of the text as read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_hash: Option<ContentHash>,
    /// Hash of the rewritten text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_hash: Option<ContentHash>,
    /// Dry-run order-dependence findings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl TargetReport {
    pub(crate) fn new(target: &TargetDescriptor) -> Self {
        Self {
            site_id: target.site_id.clone(),
            location: target.location.clone(),
            outcome: Outcome::NoChangesNeeded,
            written: false,
            rules: MatchReport::default(),
            failed_checks: Vec::new(),
            arity_violation: None,
            error: None,
            original_hash: None,
            new_hash: None,
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn record_failure(&mut self, failure: &MigrationFailure) {
        self.outcome = failure.outcome();
        self.written = false;
        self.error = Some(failure.to_string());
        if let MigrationFailure::ArityViolation(violation) = failure {
            self.rules = violation.report.clone();
            self.arity_violation = Some(ArityDetail {
                rule_id: violation.rule_id.clone(),
                arity: violation.arity,
                observed: violation.observed,
            });
        }
    }

    /// Whether the target failed
    #[inline]
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.outcome.is_failure()
    }
}

/// Everything one run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Version of the rule repository used
    pub repository_version: String,
    /// Whether writes were suppressed
    pub dry_run: bool,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: DateTime<Utc>,
    /// Targets per outcome, only outcomes that occurred
    pub summary: IndexMap<Outcome, usize>,
    /// Per-target reports, in target-list order
    pub targets: Vec<TargetReport>,
}

impl AggregateReport {
    pub(crate) fn new(
        repository_version: impl Into<String>,
        dry_run: bool,
        started_at: DateTime<Utc>,
        targets: Vec<TargetReport>,
    ) -> Self {
        let mut summary = IndexMap::new();
        for outcome in Outcome::ALL {
            let count = targets.iter().filter(|t| t.outcome == outcome).count();
            if count > 0 {
                summary.insert(outcome, count);
            }
        }
        Self {
            run_id: Uuid::new_v4(),
            repository_version: repository_version.into(),
            dry_run,
            started_at,
            finished_at: Utc::now(),
            summary,
            targets,
        }
    }

    /// True if no target failed
    #[must_use]
    pub fn passed(&self) -> bool {
        !self.targets.iter().any(TargetReport::is_failure)
    }

    /// Targets with this outcome
    #[must_use]
    pub fn count(&self, outcome: Outcome) -> usize {
        self.summary.get(&outcome).copied().unwrap_or(0)
    }

    /// Report of one site
    #[must_use]
    pub fn target(&self, site_id: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|t| t.site_id == site_id)
    }

    /// Site ids of failed targets, for re-running with `only`
    #[must_use]
    pub fn failed_sites(&self) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|t| t.is_failure())
            .map(|t| t.site_id.as_str())
            .collect()
    }

    /// Pretty JSON
    ///
    /// # Errors
    /// Returns serialization errors
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        let _ = writeln!(report, "=== fleetmig Migration Report ===\n");
        let _ = writeln!(report, "Run: {}", self.run_id);
        let _ = writeln!(report, "Rules: {}", self.repository_version);
        let _ = writeln!(report, "Dry Run: {}", self.dry_run);
        let _ = writeln!(report, "Targets: {}", self.targets.len());
        for (outcome, count) in &self.summary {
            let _ = writeln!(report, "  {outcome}: {count}");
        }

        let _ = writeln!(report, "\n=== Targets ===");
        for target in &self.targets {
            let written = if target.written { " (written)" } else { "" };
            let _ = writeln!(
                report,
                "{} [{}] {}{written}",
                target.site_id,
                target.location.display(),
                target.outcome
            );
            if let Some(error) = &target.error {
                let _ = writeln!(report, "    {error}");
            }
            for check in &target.failed_checks {
                for finding in &check.findings {
                    let _ = writeln!(report, "    {}: {finding}", check.check);
                }
            }
            for diagnostic in &target.diagnostics {
                let _ = writeln!(report, "    warning: {diagnostic}");
            }
        }

        let _ = writeln!(
            report,
            "\n=== Result: {} ===",
            if self.passed() { "PASS" } else { "FAIL" }
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetmig_engine::{CheckName, TargetDescriptor};

    fn target_report(site: &str, outcome: Outcome) -> TargetReport {
        let target = TargetDescriptor::new(format!("workers/{site}.py"), site, "https://x.com");
        let mut report = TargetReport::new(&target);
        report.outcome = outcome;
        report
    }

    #[test]
    fn failure_classification() {
        assert!(!Outcome::Success.is_failure());
        assert!(!Outcome::NoChangesNeeded.is_failure());
        for outcome in &Outcome::ALL[2..] {
            assert!(outcome.is_failure(), "{outcome}");
        }
    }

    #[test]
    fn summary_counts_and_pass() {
        let report = AggregateReport::new(
            "test/1",
            false,
            Utc::now(),
            vec![
                target_report("a", Outcome::Success),
                target_report("b", Outcome::Success),
                target_report("c", Outcome::NoChangesNeeded),
            ],
        );
        assert!(report.passed());
        assert_eq!(report.count(Outcome::Success), 2);
        assert_eq!(report.count(Outcome::WriteFailed), 0);
        assert!(report.failed_sites().is_empty());
    }

    #[test]
    fn failures_listed_in_text_and_json() {
        let mut failed = target_report("b", Outcome::Success);
        failed.record_failure(&MigrationFailure::VerificationFailure {
            failed: vec![CheckName::CoordinationKeyed],
        });
        failed.failed_checks.push(CheckResult {
            check: CheckName::CoordinationKeyed,
            passed: false,
            findings: vec!["line 3: legacy identifier `_seen_lock` remains".to_string()],
        });
        let report = AggregateReport::new(
            "test/1",
            false,
            Utc::now(),
            vec![target_report("a", Outcome::Success), failed],
        );

        assert!(!report.passed());
        assert_eq!(report.failed_sites(), vec!["b"]);

        let text = report.generate_text();
        assert!(text.contains("b [workers/b.py] verification_failed"));
        assert!(text.contains("coordination_keyed: line 3: legacy identifier"));
        assert!(text.ends_with("=== Result: FAIL ===\n"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["summary"]["verification_failed"], 1);
        assert_eq!(json["targets"][1]["outcome"], "verification_failed");
        assert!(json["targets"][0].get("error").is_none());
    }
}
