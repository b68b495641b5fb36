// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consumes build events off the event bus and turns each into a job
//! per matching device (§3, §4.4). A build opts a try push in only with
//! an explicit `autophone` token in its comment; a non-try push always
//! qualifies. Within that, a build is routed to every device whose
//! `devices.ini` hardware string is the *longest* matching prefix of
//! the build's platform string — a device with no hardware string
//! configured accepts any platform, but loses to any device that
//! matches more specifically.

use std::sync::Arc;

use autophone_adapters::{EventBusClient, PulseError};
use autophone_core::devices_ini::{Device, DevicesFile};
use autophone_core::job::BuildEvent;
use autophone_core::manifest::Manifest;
use autophone_storage::JobStore;
use parking_lot::Mutex;

pub struct EventBusConsumer {
    client: Box<dyn EventBusClient>,
    store: Arc<Mutex<JobStore>>,
    devices: DevicesFile,
    manifest: Manifest,
}

impl EventBusConsumer {
    pub fn new(client: Box<dyn EventBusClient>, store: Arc<Mutex<JobStore>>, devices: DevicesFile, manifest: Manifest) -> Self {
        Self { client, store, devices, manifest }
    }

    /// Consumes events until the stream closes or errors out. A single
    /// malformed message is logged and skipped rather than ending the
    /// stream.
    pub async fn run(&mut self, now_epoch_ms: impl Fn() -> u64) {
        loop {
            match self.client.next_build_event().await {
                Ok(build) => route_build(&mut self.store.lock(), &self.devices, &self.manifest, &build, now_epoch_ms()),
                Err(PulseError::Closed) => break,
                Err(err) => tracing::warn!(error = %err, "dropping unreadable pulse message"),
            }
        }
    }
}

/// Turns one build event into a job per matching device, shared by the
/// pulse consumer and the `autophone-triggerjobs` console verb so both
/// paths apply the exact same opt-in and platform-matching rules.
pub fn route_build(store: &mut JobStore, devices: &DevicesFile, manifest: &Manifest, build: &BuildEvent, now_epoch_ms: u64) {
    if !build.try_opt_in() {
        tracing::debug!(repo = %build.repo, "try push did not opt in, skipping");
        return;
    }
    let requested = build.requested_test_names();

    for (name, device) in select_devices(devices, &build.platform) {
        let specs: Vec<_> = manifest
            .matching(name, &build.repo)
            .into_iter()
            .filter(|spec| requested.is_empty() || requested.contains(&spec.class.as_str()))
            .collect();
        if specs.is_empty() {
            continue;
        }

        let job_id = store.enqueue_job(
            device.id,
            now_epoch_ms,
            build.package_url.clone(),
            build.build_id.clone(),
            build.changeset.clone(),
            build.tree.clone(),
            build.revision.clone(),
            build.revision_hash.clone(),
            false,
            build.is_try(),
        );
        for spec in specs {
            let repos = spec.device_repos.get(name).cloned().unwrap_or_default();
            store.enqueue_test(job_id, spec.class.clone(), spec.config_file.clone(), spec.chunk_index, repos);
        }
    }
}

fn select_devices<'a>(devices: &'a DevicesFile, build_platform: &str) -> Vec<(&'a str, &'a Device)> {
    let mut best_len: Option<usize> = None;
    let mut matches = Vec::new();
    for (name, device) in devices.iter() {
        let prefix_len = match &device.hardware {
            Some(hw) if build_platform.starts_with(hw.as_str()) => hw.len(),
            Some(_) => continue,
            None => 0,
        };
        match best_len {
            Some(len) if prefix_len < len => continue,
            Some(len) if prefix_len == len => {}
            _ => {
                best_len = Some(prefix_len);
                matches.clear();
            }
        }
        matches.push((name.as_str(), device));
    }
    matches
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
