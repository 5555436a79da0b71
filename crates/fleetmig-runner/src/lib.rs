//! fleetmig Runner
//!
//! Batch migration of a worker fleet: each target is read, rewritten,
//! verified and atomically replaced, and every outcome lands in one
//! aggregate report.
//!
//! # Core Concepts
//!
//! - [`Runner`]: Processes targets sequentially and never aborts the batch
//! - [`TargetStore`]: Read/replace seam; [`FsStore`] writes via temp file + rename
//! - [`AggregateReport`]: Per-target [`Outcome`]s, hashes and diagnostics
//! - [`FleetConfig`]: TOML fleet file naming targets and an optional rule file
//!
//! # Example
//!
//! ```rust,ignore
//! use fleetmig_runner::{FleetConfig, FsStore, RunOptions, Runner};
//!
//! let config = FleetConfig::load("fleet.toml")?;
//! let repo = config.repository(None)?;
//! let runner = Runner::new(&repo, FsStore)?;
//!
//! let report = runner.run(&config.targets, &RunOptions::default())?;
//! println!("{}", report.generate_text());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod error;
mod hash;
mod report;
mod runner;
mod store;

pub use config::FleetConfig;
pub use error::{ConfigError, MigrationFailure, RunnerError, WriteError};
pub use hash::{ContentHash, HashError};
pub use report::{AggregateReport, ArityDetail, Outcome, TargetReport};
pub use runner::{validate_targets, RunOptions, Runner};
pub use store::{atomic_replace, FsStore, TargetStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AggregateReport, FleetConfig, FsStore, Outcome, RunOptions, Runner, TargetStore,
    };
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use fleetmig_test_utils::simple_fleet;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn migrate_fleet_from_config() {
        let fleet = simple_fleet(&["mercari", "rakuma"]);
        let config = FleetConfig::load(fleet.config_path()).unwrap();
        let repo = config.repository(None).unwrap();
        let runner = Runner::new(&repo, FsStore).unwrap();

        let report = runner.run(&config.targets, &RunOptions::default()).unwrap();
        assert!(report.passed(), "{}", report.generate_text());
        assert_eq!(report.count(Outcome::Success), 2);
        for site in &fleet.sites {
            assert_eq!(fleet.read_worker(&site.site_id), site.migrated_source());
        }
    }
}
