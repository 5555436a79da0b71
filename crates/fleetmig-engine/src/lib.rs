//! fleetmig Engine
//!
//! Pure transformation and verification of worker sources against a
//! [`RuleRepository`](fleetmig_rules::RuleRepository).
//!
//! # Core Concepts
//!
//! - [`TargetDescriptor`]: Location, site id, base URL and flags of one worker
//! - [`apply`]: Run every rule in order over one target's text
//! - [`dry_run`]: Same, plus overlap and interference [`Diagnostic`]s
//! - [`MatchReport`]: Per-rule match counts and statuses
//! - [`Verifier`]: Post-conditions on the rewritten text
//!
//! # Example
//!
//! ```rust,ignore
//! use fleetmig_engine::{apply, TargetDescriptor, Verifier};
//! use fleetmig_rules::builtin;
//!
//! let repo = builtin::scraper_fleet()?;
//! let target = TargetDescriptor::new("workers/mercari.py", "mercari", "https://jp.mercari.com");
//!
//! let out = apply(&repo, &source, &target)?;
//! let verification = Verifier::new(&repo)?.verify(&out.new_text, &target);
//! assert!(verification.passed());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod diagnostics;
mod engine;
mod error;
mod report;
mod target;
mod verifier;

/// Python comment and string masking
pub mod lexer;

pub use diagnostics::Diagnostic;
pub use engine::{apply, dry_run, DryRun, Transformed};
pub use error::{ArityViolation, EngineError, TargetError};
pub use report::{MatchReport, RuleMatch, RuleStatus};
pub use target::{validate_targets, TargetDescriptor, TargetFlags};
pub use verifier::{CheckName, CheckResult, Verification, Verifier};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        apply, dry_run, validate_targets, CheckName, EngineError, MatchReport, RuleStatus,
        TargetDescriptor, TargetFlags, Verifier,
    };
}
