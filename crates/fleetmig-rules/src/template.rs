//! Site-parameterized templates and structural matchers
//!
//! A [`Template`] is rule text that may embed the `{site_id}` and
//! `{base_url}` placeholders. Substituted values are escaped for the context
//! they land in: regex-escaped inside matchers, `$`-escaped inside rewrites.

use crate::error::RuleError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder replaced by the target's site identifier
pub const SITE_ID_PLACEHOLDER: &str = "{site_id}";

/// Placeholder replaced by the target's base URL
pub const BASE_URL_PLACEHOLDER: &str = "{base_url}";

/// Per-target values substituted into templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateParams<'a> {
    /// Site identifier
    pub site_id: &'a str,
    /// Site base URL
    pub base_url: &'a str,
}

impl<'a> TemplateParams<'a> {
    /// Parameters used to validate templates before any target is known
    pub const PROBE: TemplateParams<'static> = TemplateParams {
        site_id: "probe_site",
        base_url: "https://probe.invalid",
    };

    /// Create params
    #[inline]
    #[must_use]
    pub const fn new(site_id: &'a str, base_url: &'a str) -> Self {
        Self { site_id, base_url }
    }
}

/// Rule text with optional site placeholders
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template(String);

impl Template {
    /// Create template from source text
    #[inline]
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    /// Raw template text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty template (a deletion when used as a rewrite)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the template references any site placeholder
    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        self.0.contains(SITE_ID_PLACEHOLDER) || self.0.contains(BASE_URL_PLACEHOLDER)
    }

    /// Substitute params for use inside a regular expression
    #[must_use]
    pub fn instantiate_pattern(&self, params: TemplateParams<'_>) -> String {
        self.substitute(params, |value| regex::escape(value))
    }

    /// Substitute params for use as a regex replacement string
    ///
    /// `$` in substituted values is doubled so capture expansion leaves it alone.
    #[must_use]
    pub fn instantiate_rewrite(&self, params: TemplateParams<'_>) -> String {
        self.substitute(params, |value| value.replace('$', "$$"))
    }

    fn substitute(&self, params: TemplateParams<'_>, escape: impl Fn(&str) -> String) -> String {
        if !self.has_placeholders() {
            return self.0.clone();
        }
        self.0
            .replace(SITE_ID_PLACEHOLDER, &escape(params.site_id))
            .replace(BASE_URL_PLACEHOLDER, &escape(params.base_url))
    }
}

impl From<&str> for Template {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for Template {
    fn from(source: String) -> Self {
        Self(source)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What text shape a rule looks for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "source", rename_all = "snake_case")]
pub enum Matcher {
    /// Free regular expression
    Pattern(Template),

    /// Python block: a column-0 header with its decorators, its indented body
    /// and trailing blank lines
    Block(Template),
}

impl Matcher {
    /// Regex matcher
    #[inline]
    #[must_use]
    pub fn pattern(source: impl Into<Template>) -> Self {
        Self::Pattern(source.into())
    }

    /// Block matcher with the given header pattern
    #[inline]
    #[must_use]
    pub fn block(header: impl Into<Template>) -> Self {
        Self::Block(header.into())
    }

    /// Block matcher for a top-level `def name(...)` and its body
    #[must_use]
    pub fn python_def(name: &str) -> Self {
        Self::Block(Template::new(format!(r"def {}\(", regex::escape(name))))
    }

    /// Underlying template
    #[inline]
    #[must_use]
    pub fn template(&self) -> &Template {
        match self {
            Self::Pattern(t) | Self::Block(t) => t,
        }
    }

    /// Regex source after substitution
    #[must_use]
    pub fn source(&self, params: TemplateParams<'_>) -> String {
        match self {
            Self::Pattern(t) => t.instantiate_pattern(params),
            Self::Block(header) => block_pattern(&header.instantiate_pattern(params)),
        }
    }

    /// Compile for one target
    ///
    /// # Errors
    /// Returns `RuleError::InvalidPattern` if the substituted source is not a valid regex
    pub fn compile(&self, params: TemplateParams<'_>) -> Result<Regex, RuleError> {
        compile_source(self.source(params))
    }
}

/// Compile regex source, rejecting patterns that match the empty string
pub(crate) fn compile_source(source: String) -> Result<Regex, RuleError> {
    match Regex::new(&source) {
        Ok(regex) if regex.is_match("") => Err(RuleError::EmptyMatch(source)),
        Ok(regex) => Ok(regex),
        Err(e) => Err(RuleError::invalid_pattern(source, e)),
    }
}

// A line that continues an open bracket: indented, or a closing `)` at column 0
const CONTINUATION: &str = r"(?:[ \t]|\))[^\n]*";

// Indented line, where a triple-quoted string may carry on past column 0
const BODY_LINE: &str = r#"[ \t]+(?:[^\n]*?(?:"""(?s:.*?)"""|'''(?s:.*?)''')[^\n]*|[^\n]*)"#;

fn block_pattern(header: &str) -> String {
    // Decorators stacked directly above the header belong to the block.
    let decorators = format!(r"(?:@[^\n]*\n(?:{CONTINUATION}\n)*)*");
    // The header runs to the first line ending in `:`. One-line blocks
    // (`def f(): return 1`) have no such line and end with their own.
    let signature =
        format!(r"(?:[^\n]*(?:\n{CONTINUATION})*?:[ \t]*(?:#[^\n]*)?|[^\n]*)(?:\n|\z)");
    // Body lines, with blank lines and column-0 comments allowed between
    // them, then trailing blank lines.
    let body = format!(r"(?:(?:#[^\n]*\n|[ \t]*\n)*{BODY_LINE}(?:\n|\z))*(?:[ \t]*\n)*");
    format!("(?m)^{decorators}{header}{signature}{body}")
}
