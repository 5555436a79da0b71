//! Coordination contract of the shared runtime library
//!
//! Names the module migrated workers import, the functions that must be
//! keyed by site, and the legacy process-wide identifiers that must vanish.

use crate::error::RuleError;
use crate::template::compile_source;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Exported surface of the shared runtime, as the rewrite rules target it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinationContract {
    /// Python module name of the shared runtime
    pub module: String,

    /// Functions whose first argument must be the worker's own site id
    pub keyed_functions: Vec<String>,

    /// Request helpers imported alongside the keyed functions
    #[serde(default)]
    pub helpers: Vec<String>,

    /// Global, unkeyed identifiers that must not survive migration
    #[serde(default)]
    pub legacy_identifiers: Vec<String>,
}

impl CoordinationContract {
    /// The `scraper_runtime` contract used by the built-in repository
    #[must_use]
    pub fn scraper_runtime() -> Self {
        Self {
            module: "scraper_runtime".to_string(),
            keyed_functions: [
                "acquire_guard",
                "release_guard",
                "lock_for",
                "load_seen",
                "save_seen",
                "rate_limit",
            ]
            .map(String::from)
            .to_vec(),
            helpers: ["random_user_agent", "realistic_headers"]
                .map(String::from)
                .to_vec(),
            legacy_identifiers: ["_recursion_guard", "_seen_lock", "in_scraper"]
                .map(String::from)
                .to_vec(),
        }
    }

    /// `from <module> import <keyed functions>, <helpers>`
    #[must_use]
    pub fn import_line(&self) -> String {
        let names: Vec<&str> = self
            .keyed_functions
            .iter()
            .chain(&self.helpers)
            .map(String::as_str)
            .collect();
        format!("from {} import {}", self.module, names.join(", "))
    }

    /// Matches the start of the shared import statement
    ///
    /// # Errors
    /// Returns error if the module name is empty or yields an invalid pattern
    pub fn import_pattern(&self) -> Result<Regex, RuleError> {
        if self.module.trim().is_empty() {
            return Err(RuleError::EmptyContract("module"));
        }
        compile_source(format!(
            r"(?m)^from[ \t]+{}[ \t]+import\b",
            regex::escape(&self.module)
        ))
    }

    /// Matches a keyed call, capturing `func` and its first argument `arg`
    ///
    /// # Errors
    /// Returns error if the contract lists no keyed functions
    pub fn keyed_call_pattern(&self) -> Result<Regex, RuleError> {
        if self.keyed_functions.is_empty() {
            return Err(RuleError::EmptyContract("keyed functions"));
        }
        compile_source(format!(
            r"\b(?P<func>{})\((?P<arg>[^,)\n]*)",
            alternation(&self.keyed_functions)
        ))
    }

    /// Matches any legacy identifier, or `None` if the contract lists none
    ///
    /// # Errors
    /// Returns error if the resulting pattern is invalid
    pub fn legacy_pattern(&self) -> Result<Option<Regex>, RuleError> {
        if self.legacy_identifiers.is_empty() {
            return Ok(None);
        }
        compile_source(format!(r"\b(?:{})\b", alternation(&self.legacy_identifiers))).map(Some)
    }
}

impl Default for CoordinationContract {
    fn default() -> Self {
        Self::scraper_runtime()
    }
}

fn alternation(names: &[String]) -> String {
    names
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_line_lists_keyed_then_helpers() {
        let contract = CoordinationContract::scraper_runtime();
        assert_eq!(
            contract.import_line(),
            "from scraper_runtime import acquire_guard, release_guard, lock_for, load_seen, \
             save_seen, rate_limit, random_user_agent, realistic_headers"
        );
    }

    #[test]
    fn import_pattern_ignores_other_modules() {
        let pattern = CoordinationContract::scraper_runtime().import_pattern().unwrap();
        assert!(pattern.is_match("x = 1\nfrom scraper_runtime import lock_for\n"));
        assert!(!pattern.is_match("from scraper_runtime_legacy import lock_for\n"));
        assert!(!pattern.is_match("    from scraper_runtime import lock_for\n"));
    }

    #[test]
    fn keyed_call_captures_first_argument() {
        let pattern = CoordinationContract::scraper_runtime()
            .keyed_call_pattern()
            .unwrap();
        let caps = pattern.captures("save_seen(\"mercari\", seen_ids)").unwrap();
        assert_eq!(&caps["func"], "save_seen");
        assert_eq!(&caps["arg"], "\"mercari\"");

        let caps = pattern.captures("    with lock_for():").unwrap();
        assert_eq!(&caps["arg"], "");
    }

    #[test]
    fn keyed_call_skips_import_names() {
        let contract = CoordinationContract::scraper_runtime();
        let pattern = contract.keyed_call_pattern().unwrap();
        assert!(!pattern.is_match(&contract.import_line()));
    }

    #[test]
    fn empty_keyed_functions_is_an_error() {
        let contract = CoordinationContract {
            keyed_functions: Vec::new(),
            ..CoordinationContract::scraper_runtime()
        };
        assert!(matches!(
            contract.keyed_call_pattern(),
            Err(RuleError::EmptyContract("keyed functions"))
        ));
    }

    #[test]
    fn empty_module_is_an_error() {
        let contract = CoordinationContract {
            module: String::new(),
            ..CoordinationContract::scraper_runtime()
        };
        assert!(matches!(
            contract.import_pattern(),
            Err(RuleError::EmptyContract("module"))
        ));
    }

    #[test]
    fn legacy_pattern_whole_words() {
        let pattern = CoordinationContract::scraper_runtime()
            .legacy_pattern()
            .unwrap()
            .unwrap();
        assert!(pattern.is_match("with _seen_lock:"));
        assert!(!pattern.is_match("with _seen_lock_v2:"));
    }
}
