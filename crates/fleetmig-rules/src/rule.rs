//! Rule definitions
//!
//! A [`Rule`] is data: a matcher, a rewrite template and an arity. Rules are
//! compiled per target into a [`CompiledRule`] once site parameters are known.

use crate::error::RuleError;
use crate::template::{compile_source, Matcher, Template, TemplateParams};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rule family, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleFamily {
    /// Delete duplicated helper definitions
    Removal,
    /// Update call sites to shared-library signatures
    CallRewrite,
    /// Replace global guard/lock/state access with site-keyed access
    CoordinationMigration,
}

impl RuleFamily {
    /// All families in execution order
    pub const ALL: [RuleFamily; 3] = [
        RuleFamily::Removal,
        RuleFamily::CallRewrite,
        RuleFamily::CoordinationMigration,
    ];

    /// Stable snake_case name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Removal => "removal",
            Self::CallRewrite => "call_rewrite",
            Self::CoordinationMigration => "coordination_migration",
        }
    }
}

impl fmt::Display for RuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected match count class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Arity {
    /// Exactly one match in well-formed input
    ExactlyOne,
    /// At most one match
    ZeroOrOne,
    /// Any number of matches
    #[default]
    ZeroOrMore,
}

impl Arity {
    /// Whether `observed` matches are acceptable
    #[inline]
    #[must_use]
    pub fn admits(self, observed: usize) -> bool {
        match self {
            Self::ExactlyOne => observed == 1,
            Self::ZeroOrOne => observed <= 1,
            Self::ZeroOrMore => true,
        }
    }

    /// Stable kebab-case name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExactlyOne => "exactly-one",
            Self::ZeroOrOne => "zero-or-one",
            Self::ZeroOrMore => "zero-or-more",
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookup of named boolean target flags
pub trait FlagSource {
    /// Flag value; unknown flags read as `false`
    fn flag(&self, name: &str) -> bool;
}

/// Gate restricting a rule to targets whose flag has a given value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Applicability {
    /// Flag name
    pub flag: String,
    /// Required value
    pub equals: bool,
}

impl Applicability {
    /// Gate on `flag == equals`
    #[inline]
    #[must_use]
    pub fn flag_is(flag: impl Into<String>, equals: bool) -> Self {
        Self {
            flag: flag.into(),
            equals,
        }
    }

    /// Evaluate against target flags
    #[inline]
    #[must_use]
    pub fn holds(&self, flags: &dyn FlagSource) -> bool {
        flags.flag(&self.flag) == self.equals
    }
}

/// One parameterized match-and-replace transformation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    id: String,
    family: RuleFamily,
    matcher: Matcher,
    #[serde(default)]
    rewrite: Template,
    #[serde(default)]
    arity: Arity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    when: Option<Applicability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    already_applied: Option<Template>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
}

impl Rule {
    /// Create rule
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        family: RuleFamily,
        matcher: Matcher,
        rewrite: impl Into<Template>,
    ) -> Self {
        Self {
            id: id.into(),
            family,
            matcher,
            rewrite: rewrite.into(),
            arity: Arity::default(),
            when: None,
            already_applied: None,
            description: String::new(),
        }
    }

    /// Removal rule (empty rewrite)
    #[inline]
    #[must_use]
    pub fn removal(id: impl Into<String>, matcher: Matcher) -> Self {
        Self::new(id, RuleFamily::Removal, matcher, Template::default())
    }

    /// Call-rewrite rule
    #[inline]
    #[must_use]
    pub fn call_rewrite(
        id: impl Into<String>,
        matcher: Matcher,
        rewrite: impl Into<Template>,
    ) -> Self {
        Self::new(id, RuleFamily::CallRewrite, matcher, rewrite)
    }

    /// Coordination-migration rule
    #[inline]
    #[must_use]
    pub fn coordination(
        id: impl Into<String>,
        matcher: Matcher,
        rewrite: impl Into<Template>,
    ) -> Self {
        Self::new(id, RuleFamily::CoordinationMigration, matcher, rewrite)
    }

    /// Set arity
    #[inline]
    #[must_use]
    pub fn with_arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    /// Only apply when `flag == equals`
    #[inline]
    #[must_use]
    pub fn when_flag(mut self, flag: impl Into<String>, equals: bool) -> Self {
        self.when = Some(Applicability::flag_is(flag, equals));
        self
    }

    /// Pattern recognising text this rule has already migrated
    #[inline]
    #[must_use]
    pub fn already_applied(mut self, detector: impl Into<Template>) -> Self {
        self.already_applied = Some(detector.into());
        self
    }

    /// Set description
    #[inline]
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Rule id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Rule family
    #[inline]
    #[must_use]
    pub fn family(&self) -> RuleFamily {
        self.family
    }

    /// Matcher
    #[inline]
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Rewrite template
    #[inline]
    #[must_use]
    pub fn rewrite(&self) -> &Template {
        &self.rewrite
    }

    /// Arity
    #[inline]
    #[must_use]
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Applicability gate
    #[inline]
    #[must_use]
    pub fn when(&self) -> Option<&Applicability> {
        self.when.as_ref()
    }

    /// Already-applied detector
    #[inline]
    #[must_use]
    pub fn already_applied_detector(&self) -> Option<&Template> {
        self.already_applied.as_ref()
    }

    /// Description
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// True when the rewrite deletes what it matches
    #[inline]
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        self.rewrite.is_empty()
    }

    /// Whether this rule applies to a target with these flags
    #[inline]
    #[must_use]
    pub fn applies_to(&self, flags: &dyn FlagSource) -> bool {
        self.when.as_ref().map_or(true, |gate| gate.holds(flags))
    }

    /// Compile against one target's parameters
    ///
    /// # Errors
    /// Returns error if any pattern fails to compile or the rewrite references
    /// a capture group the matcher does not define
    pub fn compile(&self, params: TemplateParams<'_>) -> Result<CompiledRule<'_>, RuleError> {
        let matcher = self.matcher.compile(params)?;
        let rewrite = self.rewrite.instantiate_rewrite(params);
        check_capture_references(&matcher, &rewrite)?;
        let already_applied = self
            .already_applied
            .as_ref()
            .map(|t| compile_source(t.instantiate_pattern(params)))
            .transpose()?;

        Ok(CompiledRule {
            rule: self,
            matcher,
            rewrite,
            already_applied,
        })
    }

    /// Validate id format and compile with probe parameters
    ///
    /// # Errors
    /// Returns the first problem found
    pub fn validate(&self) -> Result<(), RuleError> {
        let id_ok = !self.id.is_empty()
            && self
                .id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !id_ok {
            return Err(RuleError::InvalidId(self.id.clone()));
        }
        self.compile(TemplateParams::PROBE).map(|_| ())
    }
}

/// A rule instantiated for one target
#[derive(Debug, Clone)]
pub struct CompiledRule<'r> {
    /// Source rule
    pub rule: &'r Rule,
    /// Matcher with site values substituted
    pub matcher: Regex,
    /// Replacement string in regex expansion syntax
    pub rewrite: String,
    /// Post-migration shape detector
    pub already_applied: Option<Regex>,
}

impl CompiledRule<'_> {
    /// Number of non-overlapping matches in `text`
    #[inline]
    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        self.matcher.find_iter(text).count()
    }

    /// Byte spans of all matches in `text`
    #[must_use]
    pub fn spans(&self, text: &str) -> Vec<std::ops::Range<usize>> {
        self.matcher.find_iter(text).map(|m| m.range()).collect()
    }

    /// Whether the post-migration shape is present
    #[inline]
    #[must_use]
    pub fn is_already_applied(&self, text: &str) -> bool {
        self.already_applied
            .as_ref()
            .is_some_and(|detector| detector.is_match(text))
    }

    /// Replace every match
    #[inline]
    #[must_use]
    pub fn replace_all(&self, text: &str) -> String {
        self.matcher
            .replace_all(text, self.rewrite.as_str())
            .into_owned()
    }
}

fn check_capture_references(matcher: &Regex, rewrite: &str) -> Result<(), RuleError> {
    let bytes = rewrite.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'$') {
            i += 2;
            continue;
        }
        let (group, next) = if bytes.get(i + 1) == Some(&b'{') {
            match rewrite[i + 2..].find('}') {
                Some(end) => (&rewrite[i + 2..i + 2 + end], i + 3 + end),
                None => break,
            }
        } else {
            let len = rewrite[i + 1..]
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
                .count();
            (&rewrite[i + 1..i + 1 + len], i + 1 + len)
        };
        if !group.is_empty() && !group_exists(matcher, group) {
            return Err(RuleError::UnknownCaptureGroup {
                group: group.to_string(),
            });
        }
        i = next.max(i + 1);
    }
    Ok(())
}

fn group_exists(matcher: &Regex, group: &str) -> bool {
    match group.parse::<usize>() {
        Ok(index) => index < matcher.captures_len(),
        Err(_) => matcher.capture_names().flatten().any(|name| name == group),
    }
}
