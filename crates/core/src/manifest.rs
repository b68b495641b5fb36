// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test manifest parsing (§3, §6). Each manifest section names a test
//! class; its `config` key lists space-separated config files (one chunk
//! per config file); any other key is a device name whose value is a
//! space-separated repo allow-list for that device.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One chunk of a manifest-declared test class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpec {
    pub class: String,
    pub config_file: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    /// Devices this test is restricted to, each with its own repo
    /// allow-list. Empty means "any registered device".
    pub device_repos: HashMap<String, Vec<String>>,
}

impl TestSpec {
    /// A test is runnable on `device` for `build_repo` iff the device map is
    /// empty (any device) or contains the device with an empty or matching
    /// repo list (§3).
    pub fn runs_on(&self, device_name: &str, build_repo: &str) -> bool {
        if self.device_repos.is_empty() {
            return true;
        }
        match self.device_repos.get(device_name) {
            None => false,
            Some(repos) => repos.is_empty() || repos.iter().any(|r| r == build_repo),
        }
    }

    pub fn devices(&self) -> Vec<&str> {
        self.device_repos.keys().map(String::as_str).collect()
    }
}

/// The full parsed test manifest: one or more chunks per test class.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub specs: Vec<TestSpec>,
}

impl Manifest {
    /// Parse an ini-style manifest: `[class-name]` sections, a `config`
    /// key with space-separated config files, any other key treated as a
    /// device name with a space-separated repo list.
    pub fn parse(contents: &str) -> Self {
        let mut specs = Vec::new();
        let mut current_name: Option<String> = None;
        let mut current_fields: HashMap<String, String> = HashMap::new();

        let mut flush = |name: &Option<String>, fields: &HashMap<String, String>, out: &mut Vec<TestSpec>| {
            let Some(name) = name else { return };
            let configs: Vec<&str> = fields
                .get("config")
                .map(|v| v.split_whitespace().collect())
                .unwrap_or_default();
            let mut device_repos = HashMap::new();
            for (key, value) in fields {
                if key == "config" {
                    continue;
                }
                device_repos.insert(key.clone(), value.split_whitespace().map(str::to_string).collect());
            }
            let total_chunks = configs.len().max(1) as u32;
            if configs.is_empty() {
                out.push(TestSpec {
                    class: name.clone(),
                    config_file: String::new(),
                    chunk_index: 1,
                    total_chunks,
                    device_repos,
                });
            } else {
                for (i, config_file) in configs.iter().enumerate() {
                    out.push(TestSpec {
                        class: name.clone(),
                        config_file: config_file.to_string(),
                        chunk_index: (i + 1) as u32,
                        total_chunks,
                        device_repos: device_repos.clone(),
                    });
                }
            }
        };

        for raw_line in contents.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                flush(&current_name, &current_fields, &mut specs);
                current_name = Some(section.trim().to_string());
                current_fields = HashMap::new();
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                current_fields.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        flush(&current_name, &current_fields, &mut specs);

        Self { specs }
    }

    /// Tests runnable on `device` for a build from `build_repo`.
    pub fn matching(&self, device_name: &str, build_repo: &str) -> Vec<&TestSpec> {
        self.specs.iter().filter(|t| t.runs_on(device_name, build_repo)).collect()
    }

    /// All device names referenced by at least one test, used to build the
    /// match index the supervisor consults in `on_build` (§4.3).
    pub fn all_devices(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for spec in &self.specs {
            for d in spec.devices() {
                if seen.insert(d) {
                    out.push(d);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[autophone-smoke]
config = smoketest.ini
nexus-1 = mozilla-central try

[autophone-mochitest]
config = mochitest-1.ini mochitest-2.ini
";

    #[test]
    fn expands_one_chunk_per_config_file() {
        let manifest = Manifest::parse(SAMPLE);
        let chunks: Vec<_> =
            manifest.specs.iter().filter(|t| t.class == "autophone-mochitest").collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].total_chunks, 2);
        assert_eq!(chunks[0].chunk_index, 1);
        assert_eq!(chunks[1].chunk_index, 2);
    }

    #[test]
    fn device_restricted_test_matches_only_that_device_and_repo() {
        let manifest = Manifest::parse(SAMPLE);
        let smoke = &manifest.specs[0];
        assert!(smoke.runs_on("nexus-1", "try"));
        assert!(!smoke.runs_on("nexus-1", "other-repo"));
        assert!(!smoke.runs_on("nexus-2", "try"));
    }

    #[test]
    fn unrestricted_test_matches_any_device() {
        let manifest = Manifest::parse(SAMPLE);
        let mochi = manifest.specs.iter().find(|t| t.class == "autophone-mochitest").unwrap();
        assert!(mochi.runs_on("nexus-7", "anything"));
    }

    #[test]
    fn matching_filters_by_device_and_repo() {
        let manifest = Manifest::parse(SAMPLE);
        let matches = manifest.matching("nexus-1", "mozilla-central");
        assert!(matches.iter().any(|t| t.class == "autophone-smoke"));
        assert!(matches.iter().any(|t| t.class == "autophone-mochitest"));
    }
}
