// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test fixtures shared across crates (gated behind `test-support`).

use crate::devices_ini::DeviceId;
use crate::job::{BuildEvent, BuildType, Job, JobId, TestItem, TestItemId};

pub fn fixture_build_event(repo: &str, platform: &str, comments: &str) -> BuildEvent {
    BuildEvent {
        repo: repo.to_string(),
        platform: platform.to_string(),
        build_type: BuildType::Opt,
        build_id: "20260115120000".to_string(),
        package_url: "https://example.test/fennec.apk".to_string(),
        comments: comments.to_string(),
        symbols_url: None,
        tests_url: None,
        changeset: "abc123".to_string(),
        tree: repo.to_string(),
        revision: "abc123".to_string(),
        revision_hash: "deadbeef".to_string(),
    }
}

pub fn fixture_job(device_id: DeviceId) -> Job {
    Job {
        id: JobId::new(),
        created_at_epoch_ms: 1_000_000,
        last_attempt_at_epoch_ms: None,
        build_url: "https://example.test/fennec.apk".to_string(),
        build_id: "20260115120000".to_string(),
        changeset: "abc123".to_string(),
        tree: "mozilla-central".to_string(),
        revision: "abc123".to_string(),
        revision_hash: "deadbeef".to_string(),
        enable_unittests: false,
        attempts: 0,
        device_id,
        is_try: false,
    }
}

pub fn fixture_test_item(job_id: JobId, name: &str) -> TestItem {
    TestItem {
        guid: TestItemId::new(),
        job_id,
        name: name.to_string(),
        config_file: format!("{name}.ini"),
        chunk: 1,
        repos: Vec::new(),
        cancelled: false,
    }
}
