//! Testing utilities for the fleetmig workspace
//!
//! Legacy and migrated worker fixtures plus on-disk fleet setup.

#![allow(missing_docs)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SITE: &str = "__SITE__";
const BASE: &str = "__BASE__";
const DRIVER_SLOT: &str = "__DRIVER__";

const LEGACY_WORKER: &str = r#""""Listing worker for __SITE__."""

import json
import os
import random
import threading
import time

import requests

BASE_URL = "__BASE__"
SEEN_FILE = os.path.join(os.path.dirname(__file__), "seen___SITE__.json")

USER_AGENTS = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15",
]

_recursion_guard = threading.local()
_seen_lock = threading.Lock()
seen_ids = set()


def get_random_user_agent():
    return random.choice(USER_AGENTS)


def get_realistic_headers():
    return {
        "User-Agent": get_random_user_agent(),
        "Accept-Language": "ja,en-US;q=0.9",
        "Referer": BASE_URL,
    }


def load_seen():
    if os.path.exists(SEEN_FILE):
        with open(SEEN_FILE) as f:
            return set(json.load(f))
    return set()


def save_seen():
    with open(SEEN_FILE, "w") as f:
        json.dump(sorted(seen_ids), f)


def rate_limit(delay=1.5):
    time.sleep(delay + random.random())


__DRIVER__def parse_items(payload):
    # drop sold-out entries (status "sold_out" or "trading"
    return [item for item in payload.get("items", []) if item.get("status") != "sold_out"]


def run_scraper(keywords):
    global seen_ids
    if getattr(_recursion_guard, 'in_scraper', False):
        return []
    _recursion_guard.in_scraper = True
    try:
        seen_ids = load_seen()
        results = []
        for keyword in keywords:
            rate_limit()
            response = requests.get(
                BASE_URL + "/search",
                params={"keyword": keyword},
                headers=get_realistic_headers(),
                timeout=10,
            )
            for item in parse_items(response.json()):
                with _seen_lock:
                    if item["id"] in seen_ids:
                        continue
                    seen_ids.add(item["id"])
                results.append(item)
        with _seen_lock:
            save_seen()
        return results
    finally:
        _recursion_guard.in_scraper = False
"#;

const MIGRATED_WORKER: &str = r#""""Listing worker for __SITE__."""

import json
import os
import random
import threading
import time

import requests

BASE_URL = "__BASE__"

USER_AGENTS = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15",
]

from scraper_runtime import acquire_guard, release_guard, lock_for, load_seen, save_seen, rate_limit, random_user_agent, realistic_headers
seen_ids = load_seen("__SITE__")


__DRIVER__def parse_items(payload):
    # drop sold-out entries (status "sold_out" or "trading"
    return [item for item in payload.get("items", []) if item.get("status") != "sold_out"]


def run_scraper(keywords):
    global seen_ids
    if not acquire_guard("__SITE__"):
        return []
    try:
        seen_ids = load_seen("__SITE__")
        results = []
        for keyword in keywords:
            rate_limit("__SITE__")
            response = requests.get(
                BASE_URL + "/search",
                params={"keyword": keyword},
                headers=realistic_headers("__BASE__"),
                timeout=10,
            )
            for item in parse_items(response.json()):
                with lock_for("__SITE__"):
                    if item["id"] in seen_ids:
                        continue
                    seen_ids.add(item["id"])
                results.append(item)
        with lock_for("__SITE__"):
            save_seen("__SITE__", seen_ids)
        return results
    finally:
        release_guard("__SITE__")
"#;

const DRIVER_HELPER: &str = r#"def get_driver():
    from selenium import webdriver

    options = webdriver.ChromeOptions()
    options.add_argument("--headless")
    return webdriver.Chrome(options=options)


"#;

fn render(template: &str, site_id: &str, base_url: &str, driver: bool) -> String {
    template
        .replace(DRIVER_SLOT, if driver { DRIVER_HELPER } else { "" })
        .replace(SITE, site_id)
        .replace(BASE, base_url)
}

/// Legacy worker with its own helpers and global coordination state
pub fn legacy_worker(site_id: &str, base_url: &str) -> String {
    render(LEGACY_WORKER, site_id, base_url, false)
}

/// Legacy worker that also defines a `get_driver` browser helper
pub fn legacy_worker_with_driver(site_id: &str, base_url: &str) -> String {
    render(LEGACY_WORKER, site_id, base_url, true)
}

/// Expected result of migrating [`legacy_worker`] with the built-in rules
pub fn migrated_worker(site_id: &str, base_url: &str) -> String {
    render(MIGRATED_WORKER, site_id, base_url, false)
}

/// Expected result of migrating [`legacy_worker_with_driver`] when the driver is preserved
pub fn migrated_worker_with_driver(site_id: &str, base_url: &str) -> String {
    render(MIGRATED_WORKER, site_id, base_url, true)
}

/// Default base URL for a fixture site
pub fn base_url_for(site_id: &str) -> String {
    format!("https://{site_id}.example.com")
}

/// One worker of a fixture fleet
#[derive(Debug, Clone)]
pub struct FleetSite {
    pub site_id: String,
    pub base_url: String,
    pub with_driver: bool,
    pub preserve_legacy_driver: bool,
}

impl FleetSite {
    pub fn new(site_id: &str) -> Self {
        Self {
            site_id: site_id.to_string(),
            base_url: base_url_for(site_id),
            with_driver: false,
            preserve_legacy_driver: false,
        }
    }

    pub fn with_driver(mut self, preserve: bool) -> Self {
        self.with_driver = true;
        self.preserve_legacy_driver = preserve;
        self
    }

    pub fn legacy_source(&self) -> String {
        render(LEGACY_WORKER, &self.site_id, &self.base_url, self.with_driver)
    }

    pub fn migrated_source(&self) -> String {
        render(
            MIGRATED_WORKER,
            &self.site_id,
            &self.base_url,
            self.with_driver && self.preserve_legacy_driver,
        )
    }

    /// Location relative to the fleet directory
    pub fn relative_location(&self) -> String {
        format!("workers/{}.py", self.site_id)
    }
}

/// Temporary directory holding legacy workers and a `fleet.toml`
pub struct LegacyFleet {
    dir: TempDir,
    pub sites: Vec<FleetSite>,
}

impl LegacyFleet {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("fleet.toml")
    }

    pub fn worker_path(&self, site_id: &str) -> PathBuf {
        self.dir
            .path()
            .join("workers")
            .join(format!("{site_id}.py"))
    }

    pub fn read_worker(&self, site_id: &str) -> String {
        std::fs::read_to_string(self.worker_path(site_id)).unwrap()
    }

    pub fn write_worker(&self, site_id: &str, source: &str) {
        std::fs::write(self.worker_path(site_id), source).unwrap();
    }

    pub fn site(&self, site_id: &str) -> &FleetSite {
        self.sites.iter().find(|s| s.site_id == site_id).unwrap()
    }
}

/// `fleet.toml` text listing `sites` with relative locations
pub fn fleet_toml(sites: &[FleetSite]) -> String {
    let mut out = String::new();
    for site in sites {
        let _ = write!(
            out,
            "[[targets]]\nlocation = \"{}\"\nsite_id = \"{}\"\nbase_url = \"{}\"\n\n[targets.flags]\npreserve_legacy_driver = {}\n\n",
            site.relative_location(),
            site.site_id,
            site.base_url,
            site.preserve_legacy_driver,
        );
    }
    out
}

/// Write legacy workers and `fleet.toml` into a fresh temporary directory
pub fn write_legacy_fleet(sites: Vec<FleetSite>) -> LegacyFleet {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("workers")).unwrap();
    let fleet = LegacyFleet { dir, sites };
    for site in &fleet.sites {
        fleet.write_worker(&site.site_id, &site.legacy_source());
    }
    std::fs::write(fleet.config_path(), fleet_toml(&fleet.sites)).unwrap();
    fleet
}

/// Fleet of plain legacy workers for the given site ids
pub fn simple_fleet(site_ids: &[&str]) -> LegacyFleet {
    write_legacy_fleet(site_ids.iter().map(|s| FleetSite::new(s)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_substitute_site() {
        let legacy = legacy_worker("mercari", "https://jp.mercari.com");
        assert!(legacy.contains("BASE_URL = \"https://jp.mercari.com\""));
        assert!(!legacy.contains(SITE));
        assert!(!legacy.contains(DRIVER_SLOT));
        assert!(!legacy.contains("def get_driver"));
        assert!(legacy_worker_with_driver("m", "https://m").contains("def get_driver():"));

        let migrated = migrated_worker("mercari", "https://jp.mercari.com");
        assert!(migrated.contains("acquire_guard(\"mercari\")"));
        assert!(!migrated.contains("_recursion_guard"));
    }

    #[test]
    fn fleet_written_to_disk() {
        let fleet = simple_fleet(&["mercari", "rakuma"]);
        assert!(fleet.config_path().exists());
        assert_eq!(
            fleet.read_worker("rakuma"),
            legacy_worker("rakuma", "https://rakuma.example.com")
        );
        let config = std::fs::read_to_string(fleet.config_path()).unwrap();
        assert!(config.contains("location = \"workers/mercari.py\""));
    }
}
