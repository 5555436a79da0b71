//! Fleet configuration
//!
//! A fleet file names the workers to migrate and, optionally, a rule file:
//!
//! ```toml
//! rules = "rules.toml"
//!
//! [[targets]]
//! location = "workers/mercari.py"
//! site_id = "mercari"
//! base_url = "https://jp.mercari.com"
//!
//! [targets.flags]
//! preserve_legacy_driver = false
//! ```
//!
//! Relative paths are resolved against the fleet file's directory.

use crate::error::ConfigError;
use fleetmig_engine::{validate_targets, TargetDescriptor};
use fleetmig_rules::{builtin, RuleRepository};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Parsed fleet file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FleetConfig {
    /// Rule file; the built-in repository when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<PathBuf>,

    /// Workers to migrate, in processing order
    #[serde(default)]
    pub targets: Vec<TargetDescriptor>,
}

impl FleetConfig {
    /// Parse fleet TOML; paths are left as written
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` for malformed input
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text, Path::new("<inline>"))
    }

    /// Load and validate a fleet file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed, or its target
    /// list is malformed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&text, path)?;

        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        config.resolve_paths(root);
        validate_targets(&config.targets)?;
        Ok(config)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })
    }

    /// Resolve relative rule and target paths against `root`
    pub fn resolve_paths(&mut self, root: &Path) {
        if let Some(rules) = &mut self.rules {
            if rules.is_relative() {
                *rules = root.join(&*rules);
            }
        }
        for target in &mut self.targets {
            target.location = target.resolve_location(root);
        }
    }

    /// Rule repository for this fleet
    ///
    /// `override_path` wins over the fleet file's `rules`; the built-in
    /// repository is used when neither is set.
    ///
    /// # Errors
    /// Returns `ConfigError::Repository` if the rule file fails to load
    pub fn repository(&self, override_path: Option<&Path>) -> Result<RuleRepository, ConfigError> {
        match override_path.or(self.rules.as_deref()) {
            Some(path) => Ok(RuleRepository::from_toml_path(path)?),
            None => Ok(builtin::scraper_fleet()?),
        }
    }
}
