//! fleetmig Rules
//!
//! Typed, versioned rewrite rules for migrating site scraper workers onto a
//! shared, site-keyed runtime library.
//!
//! # Core Concepts
//!
//! - [`Rule`]: Matcher, rewrite template and arity, optionally gated on a target flag
//! - [`Matcher`]: Free regex or Python block matcher with site placeholders
//! - [`Template`]: Rule text embedding `{site_id}` / `{base_url}`
//! - [`RuleRepository`]: Ordered, versioned rule set fixed for one run
//! - [`CoordinationContract`]: Names exported by the shared runtime
//!
//! # Example
//!
//! ```rust,ignore
//! use fleetmig_rules::{builtin, TemplateParams};
//!
//! let repo = builtin::scraper_fleet()?;
//! let params = TemplateParams::new("mercari", "https://jp.mercari.com");
//!
//! for rule in repo.all_rules() {
//!     let compiled = rule.compile(params)?;
//!     println!("{}: {} matches", rule.id(), compiled.count(source));
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod contract;
mod error;
mod repository;
mod rule;
mod template;

/// Built-in rule repositories
pub mod builtin;

pub use contract::CoordinationContract;
pub use error::{RepositoryError, RuleError};
pub use repository::RuleRepository;
pub use rule::{Applicability, Arity, CompiledRule, FlagSource, Rule, RuleFamily};
pub use template::{
    Matcher, Template, TemplateParams, BASE_URL_PLACEHOLDER, SITE_ID_PLACEHOLDER,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::builtin::scraper_fleet;
    pub use crate::{
        Arity, CoordinationContract, FlagSource, Matcher, Rule, RuleFamily, RuleRepository,
        TemplateParams,
    };
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn builtin_ids_are_unique_and_family_ordered() {
        let repo = builtin::scraper_fleet().unwrap();
        let ids: HashSet<_> = repo.all_rules().iter().map(Rule::id).collect();
        assert_eq!(ids.len(), repo.len());

        let families: Vec<_> = repo.all_rules().iter().map(Rule::family).collect();
        let mut sorted = families.clone();
        sorted.sort();
        assert_eq!(families, sorted);
    }

    #[test]
    fn every_builtin_rule_compiles_for_awkward_sites() {
        let repo = builtin::scraper_fleet().unwrap();
        let params = TemplateParams::new("a_b_9", "https://x.example/$1?q=(a)");
        for rule in repo.all_rules() {
            assert!(rule.compile(params).is_ok(), "{}", rule.id());
        }
    }
}
