//! Dry-run diagnostics
//!
//! Order-dependence between rules shows up in two ways: two rules claim
//! overlapping text, or a rule only matches because an earlier rule produced
//! its input. Neither blocks a run.

use crate::lexer::line_at;
use fleetmig_rules::CompiledRule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Order-dependence finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// `first` runs over text that a later rule `second` also matches
    Overlap {
        /// Rule running now
        first: String,
        /// Later rule whose match is disturbed
        second: String,
        /// Byte offset of the overlap in the text as `first` saw it
        start: usize,
        /// End of the overlap
        end: usize,
        /// 1-based line of `start`
        line: usize,
    },

    /// A rule matches more often than it did on the original text
    Interference {
        /// Rule id
        rule_id: String,
        /// Matches on the original text
        original: usize,
        /// Matches when the rule actually ran
        observed: usize,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overlap {
                first,
                second,
                line,
                ..
            } => write!(f, "line {line}: '{first}' overlaps a match of '{second}'"),
            Self::Interference {
                rule_id,
                original,
                observed,
            } => write!(
                f,
                "'{rule_id}' matched {observed} time(s) but only {original} on the original text"
            ),
        }
    }
}

/// Overlaps between `current`'s matches and those of each rule in `later`
///
/// A deletion that swallows a later match whole is not reported: the later
/// rule simply has nothing left to do.
pub(crate) fn overlaps(
    current: &CompiledRule<'_>,
    later: &[&CompiledRule<'_>],
    text: &str,
) -> Vec<Diagnostic> {
    let spans = current.spans(text);
    if spans.is_empty() {
        return Vec::new();
    }
    let deletes = current.rule.is_deletion();

    let mut found = Vec::new();
    for other in later {
        let hit = other.spans(text).into_iter().find_map(|theirs| {
            spans.iter().find_map(|ours| {
                let swallowed = deletes && ours.start <= theirs.start && theirs.end <= ours.end;
                if swallowed {
                    None
                } else {
                    intersection(ours, &theirs)
                }
            })
        });
        if let Some(range) = hit {
            found.push(Diagnostic::Overlap {
                first: current.rule.id().to_string(),
                second: other.rule.id().to_string(),
                start: range.start,
                end: range.end,
                line: line_at(text, range.start),
            });
        }
    }
    found
}

fn intersection(a: &Range<usize>, b: &Range<usize>) -> Option<Range<usize>> {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    (start < end).then_some(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetmig_rules::{Matcher, Rule, TemplateParams};

    const PARAMS: TemplateParams<'static> = TemplateParams::new("s", "https://s.com");

    #[test]
    fn intersection_is_half_open() {
        assert_eq!(intersection(&(0..4), &(2..6)), Some(2..4));
        assert_eq!(intersection(&(0..4), &(4..6)), None);
    }

    #[test]
    fn partial_overlap_reported() {
        let a = Rule::call_rewrite("call-a", Matcher::pattern(r"foo\(\)"), "bar()");
        let b = Rule::call_rewrite("call-b", Matcher::pattern(r"\(\) \+"), "()");
        let (ca, cb) = (a.compile(PARAMS).unwrap(), b.compile(PARAMS).unwrap());

        let found = overlaps(&ca, &[&cb], "x\nfoo() + 1");
        assert_eq!(
            found,
            vec![Diagnostic::Overlap {
                first: "call-a".to_string(),
                second: "call-b".to_string(),
                start: 5,
                end: 7,
                line: 2,
            }]
        );
    }

    #[test]
    fn deletion_containing_later_match_is_benign() {
        let a = Rule::removal("remove-helper", Matcher::python_def("helper"));
        let b = Rule::call_rewrite("call-x", Matcher::pattern(r"\bx\(\)"), "y()");
        let (ca, cb) = (a.compile(PARAMS).unwrap(), b.compile(PARAMS).unwrap());

        let text = "def helper():\n    return x()\n";
        assert!(overlaps(&ca, &[&cb], text).is_empty());
    }

    #[test]
    fn rewrite_containing_later_match_is_reported() {
        let a = Rule::call_rewrite("call-a", Matcher::pattern(r"wrap\(x\(\)\)"), "w()");
        let b = Rule::call_rewrite("call-x", Matcher::pattern(r"\bx\(\)"), "y()");
        let (ca, cb) = (a.compile(PARAMS).unwrap(), b.compile(PARAMS).unwrap());

        assert_eq!(overlaps(&ca, &[&cb], "wrap(x())").len(), 1);
    }

    #[test]
    fn display() {
        let d = Diagnostic::Interference {
            rule_id: "call-b".to_string(),
            original: 0,
            observed: 2,
        };
        assert_eq!(
            d.to_string(),
            "'call-b' matched 2 time(s) but only 0 on the original text"
        );
    }
}
