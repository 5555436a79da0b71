//! Transformation engine
//!
//! Applies a repository to one target's text. Pure: no I/O, the only side
//! effect is `tracing` debug output.

use crate::diagnostics::{overlaps, Diagnostic};
use crate::error::{ArityViolation, EngineError};
use crate::report::{MatchReport, RuleStatus};
use crate::target::TargetDescriptor;
use fleetmig_rules::{CompiledRule, RuleRepository};
use tracing::debug;

/// Rewritten text and per-rule match report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// Text after every rule ran
    pub new_text: String,
    /// Per-rule counts and statuses
    pub report: MatchReport,
}

impl Transformed {
    /// Whether the text differs from `original`
    #[inline]
    #[must_use]
    pub fn changed(&self, original: &str) -> bool {
        self.new_text != original
    }
}

/// Result of a dry run: the apply outcome plus order-dependence findings
#[derive(Debug)]
pub struct DryRun {
    /// What `apply` would have returned
    pub outcome: Result<Transformed, EngineError>,
    /// Overlap and interference findings, in rule order
    pub diagnostics: Vec<Diagnostic>,
}

/// Apply every rule of `repository` to `text`
///
/// Rules run in repository order over the progressively rewritten text.
/// Processing stops at the first arity violation.
///
/// # Errors
/// Returns `EngineError::ArityViolation` when a rule's match count is not
/// admitted by its arity, or `EngineError::InvalidRule` if a rule cannot be
/// instantiated for this target
pub fn apply(
    repository: &RuleRepository,
    text: &str,
    target: &TargetDescriptor,
) -> Result<Transformed, EngineError> {
    let compiled = compile(repository, target)?;
    run(&compiled, text, |_, _| {})
}

/// Apply as [`apply`] does, collecting diagnostics along the way
#[must_use]
pub fn dry_run(repository: &RuleRepository, text: &str, target: &TargetDescriptor) -> DryRun {
    let compiled = match compile(repository, target) {
        Ok(compiled) => compiled,
        Err(e) => {
            return DryRun {
                outcome: Err(e),
                diagnostics: Vec::new(),
            }
        }
    };

    let original: Vec<usize> = compiled
        .iter()
        .map(|slot| match slot {
            Slot::Active(rule) => rule.count(text),
            Slot::Skipped(_) => 0,
        })
        .collect();

    let mut diagnostics = Vec::new();
    let outcome = run(&compiled, text, |index, current| {
        let Slot::Active(rule) = &compiled[index] else {
            return;
        };
        let observed = rule.count(current);
        if observed > original[index] {
            diagnostics.push(Diagnostic::Interference {
                rule_id: rule.rule.id().to_string(),
                original: original[index],
                observed,
            });
        }
        let later: Vec<&CompiledRule<'_>> = compiled[index + 1..]
            .iter()
            .filter_map(Slot::active)
            .collect();
        diagnostics.extend(overlaps(rule, &later, current));
    });

    DryRun {
        outcome,
        diagnostics,
    }
}

enum Slot<'r> {
    Active(CompiledRule<'r>),
    Skipped(&'r fleetmig_rules::Rule),
}

impl<'r> Slot<'r> {
    fn active(&self) -> Option<&CompiledRule<'r>> {
        match self {
            Self::Active(rule) => Some(rule),
            Self::Skipped(_) => None,
        }
    }
}

fn compile<'r>(
    repository: &'r RuleRepository,
    target: &TargetDescriptor,
) -> Result<Vec<Slot<'r>>, EngineError> {
    let params = target.params();
    repository
        .all_rules()
        .iter()
        .map(|rule| {
            if !rule.applies_to(target) {
                return Ok(Slot::Skipped(rule));
            }
            rule.compile(params)
                .map(Slot::Active)
                .map_err(|e| EngineError::invalid_rule(rule.id(), e))
        })
        .collect()
}

/// Run compiled rules in order; `inspect` sees each active rule's input text
fn run(
    rules: &[Slot<'_>],
    text: &str,
    mut inspect: impl FnMut(usize, &str),
) -> Result<Transformed, EngineError> {
    let mut current = text.to_string();
    let mut report = MatchReport::default();

    for (index, slot) in rules.iter().enumerate() {
        let compiled = match slot {
            Slot::Skipped(rule) => {
                debug!(rule = rule.id(), "rule gated off");
                report.record(rule, 0, RuleStatus::Skipped);
                continue;
            }
            Slot::Active(compiled) => compiled,
        };
        inspect(index, &current);

        let rule = compiled.rule;
        let observed = compiled.count(&current);
        let status = if observed > 0 {
            RuleStatus::Applied
        } else if compiled.is_already_applied(&current) {
            RuleStatus::AlreadyApplied
        } else {
            RuleStatus::NoMatch
        };

        if status != RuleStatus::AlreadyApplied && !rule.arity().admits(observed) {
            debug!(rule = rule.id(), arity = %rule.arity(), observed, "arity violation");
            return Err(ArityViolation {
                rule_id: rule.id().to_string(),
                arity: rule.arity(),
                observed,
                report,
            }
            .into());
        }

        if observed > 0 {
            current = compiled.replace_all(&current);
        }
        debug!(rule = rule.id(), family = %rule.family(), observed, %status, "rule processed");
        report.record(rule, observed, status);
    }

    Ok(Transformed {
        new_text: current,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetmig_rules::{Arity, CoordinationContract, Matcher, Rule};
    use pretty_assertions::assert_eq;

    fn target() -> TargetDescriptor {
        TargetDescriptor::new("w.py", "mercari", "https://jp.mercari.com")
    }

    fn repo(rules: Vec<Rule>) -> RuleRepository {
        RuleRepository::new("test/1", CoordinationContract::default(), rules).unwrap()
    }

    #[test]
    fn empty_repository_is_noop() {
        let out = apply(&RuleRepository::empty(), "x = 1\n", &target()).unwrap();
        assert_eq!(out.new_text, "x = 1\n");
        assert!(out.report.is_empty());
        assert!(!out.changed("x = 1\n"));
    }

    #[test]
    fn rules_see_progressively_rewritten_text() {
        let repo = repo(vec![
            Rule::coordination("coord-b", Matcher::pattern("b"), "c"),
            Rule::call_rewrite("call-a", Matcher::pattern("a"), "b"),
        ]);
        let out = apply(&repo, "a", &target()).unwrap();
        assert_eq!(out.new_text, "c");
        assert_eq!(out.report.count("call-a"), 1);
        assert_eq!(out.report.count("coord-b"), 1);
    }

    #[test]
    fn exactly_one_with_no_match_violates() {
        let repo = repo(vec![
            Rule::call_rewrite("call-a", Matcher::pattern("a"), "b"),
            Rule::call_rewrite("call-x", Matcher::pattern("x"), "y").with_arity(Arity::ExactlyOne),
        ]);
        let err = apply(&repo, "aaa", &target()).unwrap_err();
        let violation = err.as_arity_violation().unwrap();
        assert_eq!(violation.rule_id, "call-x");
        assert_eq!(violation.observed, 0);
        assert_eq!(violation.report.count("call-a"), 3);
        assert!(violation.report.get("call-x").is_none());
    }

    #[test]
    fn zero_or_one_with_two_matches_violates() {
        let repo = repo(vec![
            Rule::removal("remove-x", Matcher::pattern("x")).with_arity(Arity::ZeroOrOne)
        ]);
        let err = apply(&repo, "x x", &target()).unwrap_err();
        assert_eq!(err.as_arity_violation().unwrap().observed, 2);
    }

    #[test]
    fn already_applied_satisfies_exactly_one() {
        let repo = repo(vec![Rule::coordination(
            "coord-guard",
            Matcher::pattern("global_guard"),
            "guard(\"{site_id}\")",
        )
        .with_arity(Arity::ExactlyOne)
        .already_applied(r#"guard\("{site_id}"\)"#)]);

        let first = apply(&repo, "global_guard\n", &target()).unwrap();
        assert_eq!(first.new_text, "guard(\"mercari\")\n");

        let second = apply(&repo, &first.new_text, &target()).unwrap();
        assert_eq!(second.new_text, first.new_text);
        assert_eq!(
            second.report.get("coord-guard").unwrap().status,
            RuleStatus::AlreadyApplied
        );

        // another site's migrated shape does not count
        let other = TargetDescriptor::new("o.py", "rakuma", "https://fril.jp");
        assert!(apply(&repo, &first.new_text, &other).is_err());
    }

    #[test]
    fn gated_rule_skipped() {
        let repo = repo(vec![
            Rule::removal("remove-x", Matcher::pattern("x")).when_flag("keep_x", false)
        ]);
        let target = target().with_flags(crate::TargetFlags::default().with("keep_x", true));
        let out = apply(&repo, "x", &target).unwrap();
        assert_eq!(out.new_text, "x");
        assert_eq!(
            out.report.get("remove-x").unwrap().status,
            RuleStatus::Skipped
        );
    }

    #[test]
    fn dry_run_reports_interference() {
        let repo = repo(vec![
            Rule::call_rewrite("call-a", Matcher::pattern("a"), "bb"),
            Rule::coordination("coord-b", Matcher::pattern("b"), "c"),
        ]);
        let dry = dry_run(&repo, "ab", &target());
        assert_eq!(dry.outcome.unwrap().new_text, "ccc");
        assert_eq!(
            dry.diagnostics,
            vec![Diagnostic::Interference {
                rule_id: "coord-b".to_string(),
                original: 1,
                observed: 3,
            }]
        );
    }

    #[test]
    fn dry_run_keeps_diagnostics_up_to_violation() {
        let repo = repo(vec![
            Rule::call_rewrite("call-a", Matcher::pattern("ab"), "x"),
            Rule::call_rewrite("call-b", Matcher::pattern("bc"), "y"),
            Rule::coordination("coord-z", Matcher::pattern("z"), "w").with_arity(Arity::ExactlyOne),
        ]);
        let dry = dry_run(&repo, "abc", &target());
        assert!(dry.outcome.is_err());
        assert_eq!(dry.diagnostics.len(), 1);
        assert!(matches!(
            &dry.diagnostics[0],
            Diagnostic::Overlap { first, second, .. } if first == "call-a" && second == "call-b"
        ));
    }
}
