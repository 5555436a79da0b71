//! Batch migration runner
//!
//! Processes targets one at a time: read, apply, verify, write. A failing
//! target is recorded and the batch moves on; the only errors that stop a run
//! are found before any target is touched.

use crate::error::{MigrationFailure, RunnerError};
use crate::hash::ContentHash;
use crate::report::{AggregateReport, Outcome, TargetReport};
use crate::store::TargetStore;
use chrono::Utc;
use fleetmig_engine::{apply, dry_run, TargetDescriptor, Transformed, Verifier};
use fleetmig_rules::RuleRepository;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Per-run options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Do everything but write; attach engine diagnostics
    pub dry_run: bool,
    /// Restrict the run to these site ids
    pub only: Option<BTreeSet<String>>,
}

impl RunOptions {
    /// Dry-run options
    #[must_use]
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            only: None,
        }
    }

    /// Restrict to a set of site ids
    #[must_use]
    pub fn only<I, S>(mut self, sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(sites.into_iter().map(Into::into).collect());
        self
    }

    /// Whether a site is selected
    #[must_use]
    pub fn includes(&self, site_id: &str) -> bool {
        self.only.as_ref().map_or(true, |only| only.contains(site_id))
    }
}

/// Runs one repository over a fleet of targets
pub struct Runner<'r, S> {
    repository: &'r RuleRepository,
    verifier: Verifier<'r>,
    store: S,
}

impl<'r, S: TargetStore> Runner<'r, S> {
    /// Create runner
    ///
    /// # Errors
    /// Returns `RunnerError::Contract` if the repository's contract does not
    /// yield valid verification patterns
    pub fn new(repository: &'r RuleRepository, store: S) -> Result<Self, RunnerError> {
        let verifier = Verifier::new(repository).map_err(RunnerError::Contract)?;
        Ok(Self {
            repository,
            verifier,
            store,
        })
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Migrate every selected target
    ///
    /// # Errors
    /// Returns `RunnerError::InvalidTargets` if the target list is malformed,
    /// or `RunnerError::UnknownSites` if `options` selects a site the list
    /// lacks; no target has been read at that point
    pub fn run(
        &self,
        targets: &[TargetDescriptor],
        options: &RunOptions,
    ) -> Result<AggregateReport, RunnerError> {
        fleetmig_engine::validate_targets(targets)?;
        if let Some(only) = &options.only {
            let unknown: Vec<String> = only
                .iter()
                .filter(|site| !targets.iter().any(|t| &t.site_id == *site))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(RunnerError::UnknownSites(unknown));
            }
        }

        let started_at = Utc::now();
        info!(
            version = self.repository.version(),
            targets = targets.len(),
            dry_run = options.dry_run,
            "migration started"
        );

        let reports: Vec<TargetReport> = targets
            .iter()
            .filter(|t| options.includes(&t.site_id))
            .map(|t| self.migrate(t, options))
            .collect();

        let report = AggregateReport::new(
            self.repository.version(),
            options.dry_run,
            started_at,
            reports,
        );
        info!(
            run_id = %report.run_id,
            passed = report.passed(),
            failed = report.failed_sites().len(),
            "migration finished"
        );
        Ok(report)
    }

    fn migrate(&self, target: &TargetDescriptor, options: &RunOptions) -> TargetReport {
        let mut report = TargetReport::new(target);
        match self.process(target, options, &mut report) {
            Ok(outcome) => {
                report.outcome = outcome;
                info!(site_id = %target.site_id, %outcome, written = report.written, "target processed");
            }
            Err(failure) => {
                report.record_failure(&failure);
                warn!(site_id = %target.site_id, outcome = %report.outcome, error = %failure, "target failed");
            }
        }
        report
    }

    fn process(
        &self,
        target: &TargetDescriptor,
        options: &RunOptions,
        report: &mut TargetReport,
    ) -> Result<Outcome, MigrationFailure> {
        let original = self
            .store
            .read(&target.location)
            .map_err(|source| MigrationFailure::ReadFailure {
                path: target.location.clone(),
                source,
            })?;
        let original_hash = ContentHash::of_text(&original);
        report.original_hash = Some(original_hash);

        let transformed = if options.dry_run {
            let dry = dry_run(self.repository, &original, target);
            report.diagnostics = dry.diagnostics;
            dry.outcome
        } else {
            apply(self.repository, &original, target)
        };
        let Transformed { new_text, report: matches } = transformed?;
        report.rules = matches;
        let new_hash = ContentHash::of_text(&new_text);
        report.new_hash = Some(new_hash);

        let verification = self.verifier.verify(&new_text, target);
        if !verification.passed() {
            let failed = verification.failed();
            report.failed_checks = verification
                .into_checks()
                .into_iter()
                .filter(|c| !c.passed)
                .collect();
            return Err(MigrationFailure::VerificationFailure { failed });
        }

        if new_text == original {
            return Ok(Outcome::NoChangesNeeded);
        }
        if options.dry_run {
            return Ok(Outcome::Success);
        }

        self.store
            .replace(&target.location, original_hash, &new_text)
            .map_err(MigrationFailure::WriteFailure)?;
        report.written = true;
        debug!(
            site_id = %target.site_id,
            from = %original_hash.short(),
            to = %new_hash.short(),
            "target replaced"
        );
        Ok(Outcome::Success)
    }
}

/// Check a target list without rules: formats, uniqueness and readability
///
/// Runs the engine with an empty repository, so nothing is rewritten and
/// nothing is written. Readable targets report `no_changes_needed`.
///
/// # Errors
/// Returns `RunnerError::InvalidTargets` if the target list is malformed
pub fn validate_targets<S: TargetStore>(
    store: &S,
    targets: &[TargetDescriptor],
) -> Result<AggregateReport, RunnerError> {
    fleetmig_engine::validate_targets(targets)?;
    let repository = RuleRepository::empty();
    let started_at = Utc::now();

    let reports = targets
        .iter()
        .map(|target| {
            let mut report = TargetReport::new(target);
            let checked = store
                .read(&target.location)
                .map_err(|source| MigrationFailure::ReadFailure {
                    path: target.location.clone(),
                    source,
                })
                .and_then(|text| {
                    report.original_hash = Some(ContentHash::of_text(&text));
                    apply(&repository, &text, target).map_err(MigrationFailure::from)
                });
            match checked {
                Ok(_) => info!(site_id = %target.site_id, "target readable"),
                Err(failure) => {
                    warn!(site_id = %target.site_id, error = %failure, "target unreadable");
                    report.record_failure(&failure);
                }
            }
            report
        })
        .collect();

    Ok(AggregateReport::new(
        repository.version(),
        true,
        started_at,
        reports,
    ))
}
