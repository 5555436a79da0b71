//! Target descriptors
//!
//! One descriptor per worker file. Built once per run from a static list and
//! never mutated afterwards.

use crate::error::TargetError;
use fleetmig_rules::builtin::PRESERVE_LEGACY_DRIVER;
use fleetmig_rules::{FlagSource, TemplateParams};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Per-target feature flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFlags {
    /// Keep the worker's own browser driver helper
    #[serde(default)]
    pub preserve_legacy_driver: bool,

    /// Any other named flag consulted by rule gates
    #[serde(flatten)]
    pub extra: BTreeMap<String, bool>,
}

impl TargetFlags {
    /// Set a named flag
    #[must_use]
    pub fn with(mut self, name: &str, value: bool) -> Self {
        if name == PRESERVE_LEGACY_DRIVER {
            self.preserve_legacy_driver = value;
        } else {
            self.extra.insert(name.to_string(), value);
        }
        self
    }
}

impl FlagSource for TargetFlags {
    fn flag(&self, name: &str) -> bool {
        if name == PRESERVE_LEGACY_DRIVER {
            self.preserve_legacy_driver
        } else {
            self.extra.get(name).copied().unwrap_or(false)
        }
    }
}

/// Metadata for one worker file to migrate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetDescriptor {
    /// Worker file path
    pub location: PathBuf,

    /// Site identifier, unique within a run
    pub site_id: String,

    /// Site base URL
    pub base_url: String,

    /// Feature flags
    #[serde(default)]
    pub flags: TargetFlags,
}

impl TargetDescriptor {
    /// Create descriptor with default flags
    #[must_use]
    pub fn new(
        location: impl Into<PathBuf>,
        site_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            site_id: site_id.into(),
            base_url: base_url.into(),
            flags: TargetFlags::default(),
        }
    }

    /// Replace flags
    #[inline]
    #[must_use]
    pub fn with_flags(mut self, flags: TargetFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Template parameters for this target
    #[inline]
    #[must_use]
    pub fn params(&self) -> TemplateParams<'_> {
        TemplateParams::new(&self.site_id, &self.base_url)
    }

    /// Location resolved against `root` when relative
    #[must_use]
    pub fn resolve_location(&self, root: &Path) -> PathBuf {
        if self.location.is_absolute() {
            self.location.clone()
        } else {
            root.join(&self.location)
        }
    }

    /// Check field formats
    ///
    /// # Errors
    /// Returns the first malformed field
    pub fn validate(&self) -> Result<(), TargetError> {
        let site_ok = !self.site_id.is_empty()
            && self
                .site_id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !site_ok {
            return Err(TargetError::InvalidSiteId(self.site_id.clone()));
        }

        let host = self
            .base_url
            .strip_prefix("https://")
            .or_else(|| self.base_url.strip_prefix("http://"));
        if host.map_or(true, str::is_empty) || self.base_url.contains(char::is_whitespace) {
            return Err(TargetError::InvalidBaseUrl {
                site_id: self.site_id.clone(),
                base_url: self.base_url.clone(),
            });
        }

        if self.location.as_os_str().is_empty() {
            return Err(TargetError::EmptyLocation(self.site_id.clone()));
        }
        Ok(())
    }
}

impl FlagSource for TargetDescriptor {
    fn flag(&self, name: &str) -> bool {
        self.flags.flag(name)
    }
}

/// Validate a whole target list: formats, unique site ids, unique locations
///
/// # Errors
/// Returns the first problem found, before any target is touched
pub fn validate_targets(targets: &[TargetDescriptor]) -> Result<(), TargetError> {
    let mut sites = HashSet::new();
    let mut locations = HashSet::new();
    for target in targets {
        target.validate()?;
        if !sites.insert(target.site_id.as_str()) {
            return Err(TargetError::DuplicateSiteId(target.site_id.clone()));
        }
        if !locations.insert(target.location.as_path()) {
            return Err(TargetError::DuplicateLocation(target.location.clone()));
        }
    }
    Ok(())
}
