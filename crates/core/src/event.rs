// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable event vocabulary written to the write-ahead log and
//! replayed into `MaterializedState` (§4.1).

use crate::devices_ini::DeviceId;
use crate::job::{JobId, SubmissionId, TestItemId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    JobEnqueued {
        id: JobId,
        device_id: DeviceId,
        created_at_epoch_ms: u64,
        build_url: String,
        build_id: String,
        changeset: String,
        tree: String,
        revision: String,
        revision_hash: String,
        enable_unittests: bool,
        is_try: bool,
    },
    TestEnqueued {
        guid: TestItemId,
        job_id: JobId,
        name: String,
        config_file: String,
        chunk: u32,
        repos: Vec<String>,
    },
    JobClaimed {
        id: JobId,
        attempt_at_epoch_ms: u64,
    },
    JobAttemptsSet {
        id: JobId,
        attempts: u32,
    },
    JobPurged {
        id: JobId,
    },
    TestCancelled {
        guid: TestItemId,
    },
    TestCompleted {
        guid: TestItemId,
    },
    JobCompleted {
        id: JobId,
    },
    SubmissionEnqueued {
        id: SubmissionId,
        machine: String,
        project: String,
        payload: serde_json::Value,
    },
    SubmissionClaimed {
        id: SubmissionId,
        attempt_at_epoch_ms: u64,
    },
    SubmissionCompleted {
        id: SubmissionId,
    },
    /// Recorded for visibility only; does not mutate materialized state
    /// (mirrors how control events like a daemon shutdown marker pass
    /// through the log so recovery can see but does not need to replay
    /// them as data mutations).
    Shutdown,
    /// A scheduled wake marker (retry backoff, battery-wait poll). Logged
    /// for observability; does not mutate materialized state.
    TimerStart {
        id: String,
    },
}
