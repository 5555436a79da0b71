//! Post-migration verification
//!
//! Checks rewritten text against the repository's contract. Reports only;
//! never repairs.

use crate::lexer::{line_at, mask, Mask};
use crate::target::TargetDescriptor;
use fleetmig_rules::{RuleError, RuleFamily, RuleRepository};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verification checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    /// Shared runtime import appears exactly once
    SharedImportOnce,
    /// No applicable removal rule still matches
    NoResidualRemovals,
    /// Keyed calls carry the target's own site id; no legacy identifiers
    CoordinationKeyed,
    /// `()[]{}` balanced outside strings and comments
    DelimitersBalanced,
}

impl CheckName {
    /// All checks, in evaluation order
    pub const ALL: [CheckName; 4] = [
        CheckName::SharedImportOnce,
        CheckName::NoResidualRemovals,
        CheckName::CoordinationKeyed,
        CheckName::DelimitersBalanced,
    ];

    /// Stable snake_case name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SharedImportOnce => "shared_import_once",
            Self::NoResidualRemovals => "no_residual_removals",
            Self::CoordinationKeyed => "coordination_keyed",
            Self::DelimitersBalanced => "delimiters_balanced",
        }
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Check
    pub check: CheckName,
    /// Whether it passed
    pub passed: bool,
    /// What failed, one entry per finding
    pub findings: Vec<String>,
}

impl CheckResult {
    fn from_findings(check: CheckName, findings: Vec<String>) -> Self {
        Self {
            check,
            passed: findings.is_empty(),
            findings,
        }
    }
}

/// All check results for one text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    checks: Vec<CheckResult>,
}

impl Verification {
    /// True if every check passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Names of failed checks
    #[must_use]
    pub fn failed(&self) -> Vec<CheckName> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.check)
            .collect()
    }

    /// Result of one check
    #[must_use]
    pub fn get(&self, check: CheckName) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.check == check)
    }

    /// All results
    #[must_use]
    pub fn checks(&self) -> &[CheckResult] {
        &self.checks
    }

    /// Consume into results
    #[must_use]
    pub fn into_checks(self) -> Vec<CheckResult> {
        self.checks
    }
}

/// Verifier bound to one repository
#[derive(Debug, Clone)]
pub struct Verifier<'r> {
    repository: &'r RuleRepository,
    import: Regex,
    keyed_call: Regex,
    legacy: Option<Regex>,
}

impl<'r> Verifier<'r> {
    /// Build the contract patterns once per run
    ///
    /// # Errors
    /// Returns error if the contract does not yield valid patterns
    pub fn new(repository: &'r RuleRepository) -> Result<Self, RuleError> {
        let contract = repository.contract();
        Ok(Self {
            repository,
            import: contract.import_pattern()?,
            keyed_call: contract.keyed_call_pattern()?,
            legacy: contract.legacy_pattern()?,
        })
    }

    /// Run every check against `text`
    #[must_use]
    pub fn verify(&self, text: &str, target: &TargetDescriptor) -> Verification {
        let code = mask(text, Mask::Comments);
        let bare = mask(text, Mask::CommentsAndStrings);
        let checks = vec![
            self.shared_import_once(&code.text),
            self.no_residual_removals(text, target),
            self.coordination_keyed(&code.text, &bare.text, &target.site_id),
            delimiters_balanced(text),
        ];
        Verification { checks }
    }

    fn shared_import_once(&self, code: &str) -> CheckResult {
        let lines: Vec<usize> = self
            .import
            .find_iter(code)
            .map(|m| line_at(code, m.start()))
            .collect();
        let module = &self.repository.contract().module;
        let findings = match lines.as_slice() {
            [_] => Vec::new(),
            [] => vec![format!("no `from {module} import` statement")],
            many => vec![format!(
                "{} `from {module} import` statements (lines {})",
                many.len(),
                join_lines(many)
            )],
        };
        CheckResult::from_findings(CheckName::SharedImportOnce, findings)
    }

    fn no_residual_removals(&self, text: &str, target: &TargetDescriptor) -> CheckResult {
        let mut findings = Vec::new();
        for rule in self
            .repository
            .rules_for(RuleFamily::Removal)
            .filter(|r| r.applies_to(target))
        {
            match rule.compile(target.params()) {
                Ok(compiled) => {
                    let lines: Vec<usize> = compiled
                        .spans(text)
                        .into_iter()
                        .map(|span| line_at(text, span.start))
                        .collect();
                    if !lines.is_empty() {
                        findings.push(format!(
                            "'{}' still matches at line(s) {}",
                            rule.id(),
                            join_lines(&lines)
                        ));
                    }
                }
                Err(e) => findings.push(format!("'{}' cannot be checked: {e}", rule.id())),
            }
        }
        CheckResult::from_findings(CheckName::NoResidualRemovals, findings)
    }

    /// Keyed calls are read with strings intact; legacy names only count in bare code
    fn coordination_keyed(&self, code: &str, bare: &str, site_id: &str) -> CheckResult {
        let double = format!("\"{site_id}\"");
        let single = format!("'{site_id}'");
        let mut findings = Vec::new();

        for caps in self.keyed_call.captures_iter(code) {
            let arg = caps.name("arg").map_or("", |m| m.as_str()).trim();
            if arg != double && arg != single {
                let func = caps.name("func").map_or("", |m| m.as_str());
                let line = caps.get(0).map_or(1, |m| line_at(code, m.start()));
                let shown = if arg.is_empty() { "nothing" } else { arg };
                findings.push(format!(
                    "line {line}: {func}() keyed by {shown}, expected {double}"
                ));
            }
        }

        if let Some(legacy) = &self.legacy {
            for m in legacy.find_iter(bare) {
                findings.push(format!(
                    "line {}: legacy identifier `{}` remains",
                    line_at(bare, m.start()),
                    m.as_str()
                ));
            }
        }
        CheckResult::from_findings(CheckName::CoordinationKeyed, findings)
    }
}

fn delimiters_balanced(text: &str) -> CheckResult {
    let masked = mask(text, Mask::CommentsAndStrings);
    let mut findings = Vec::new();
    if let Some(line) = masked.unterminated {
        findings.push(format!("line {line}: unterminated string literal"));
    }

    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut line = 1;
    for c in masked.text.chars() {
        match c {
            '\n' => line += 1,
            '(' | '[' | '{' => stack.push((c, line)),
            ')' | ']' | '}' => {
                let open = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((top, _)) if top == open => {}
                    Some((top, opened)) => {
                        findings.push(format!(
                            "line {line}: `{c}` closes `{top}` opened at line {opened}"
                        ));
                    }
                    None => findings.push(format!("line {line}: unmatched `{c}`")),
                }
            }
            _ => {}
        }
    }
    for (open, opened) in stack {
        findings.push(format!("line {opened}: unclosed `{open}`"));
    }
    CheckResult::from_findings(CheckName::DelimitersBalanced, findings)
}

fn join_lines(lines: &[usize]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
