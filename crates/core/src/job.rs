// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job-store data model: build events, jobs, test items, and results
//! submissions (§3, §4.1).

use crate::define_id;
use crate::devices_ini::DeviceId;
use serde::{Deserialize, Serialize};

/// Maximum number of claim attempts before a job is purged (§3, §4.1).
pub const MAX_ATTEMPTS: u32 = 3;

define_id! {
    /// Identifies a row in the *jobs* table.
    pub struct JobId("job-");
}

define_id! {
    /// The guid minted for a test item; the external correlation key used
    /// by the results service.
    pub struct TestItemId("tst-");
}

define_id! {
    /// Identifies a row in the *treeherder* (results submission) table.
    pub struct SubmissionId("sub-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildType {
    Opt,
    Debug,
}

crate::simple_display! {
    BuildType {
        Opt => "opt",
        Debug => "debug",
    }
}

/// A normalized build event admitted from the event bus (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    pub repo: String,
    pub platform: String,
    pub build_type: BuildType,
    /// 14-digit UTC build stamp, e.g. `20260115120000`.
    pub build_id: String,
    pub package_url: String,
    pub comments: String,
    pub symbols_url: Option<String>,
    pub tests_url: Option<String>,
    pub changeset: String,
    pub tree: String,
    pub revision: String,
    pub revision_hash: String,
}

impl BuildEvent {
    /// A try build opts in to Autophone with an explicit token in its commit
    /// comment (§3, §6, §8 scenario 5).
    pub fn is_try(&self) -> bool {
        self.repo == "try"
    }

    pub fn try_opt_in(&self) -> bool {
        !self.is_try() || self.comments.contains("autophone")
    }

    /// `try: -u autophone-smoke -t none` style comments restrict a try build
    /// to an explicit list of test names. An empty list means "any test".
    pub fn requested_test_names(&self) -> Vec<&str> {
        if !self.is_try() {
            return Vec::new();
        }
        let mut names = Vec::new();
        let mut tokens = self.comments.split_whitespace().peekable();
        while let Some(tok) = tokens.next() {
            if tok == "-u" {
                while let Some(&next) = tokens.peek() {
                    if next.starts_with('-') {
                        break;
                    }
                    names.push(next);
                    tokens.next();
                }
            }
        }
        names
    }
}

/// A job queued for a single device (§3, §4.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub created_at_epoch_ms: u64,
    pub last_attempt_at_epoch_ms: Option<u64>,
    pub build_url: String,
    pub build_id: String,
    pub changeset: String,
    pub tree: String,
    pub revision: String,
    pub revision_hash: String,
    pub enable_unittests: bool,
    pub attempts: u32,
    pub device_id: DeviceId,
    pub is_try: bool,
}

impl Job {
    pub fn exceeds_max_attempts(&self) -> bool {
        self.attempts >= MAX_ATTEMPTS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestResult {
    Success,
    Testfailed,
    Busted,
    Exception,
    Usercancel,
    Retry,
}

crate::simple_display! {
    TestResult {
        Success => "success",
        Testfailed => "testfailed",
        Busted => "busted",
        Exception => "exception",
        Usercancel => "usercancel",
        Retry => "retry",
    }
}

/// One test-item row, child of a [`Job`] (§3, §4.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestItem {
    pub guid: TestItemId,
    pub job_id: JobId,
    pub name: String,
    pub config_file: String,
    pub chunk: u32,
    pub repos: Vec<String>,
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionState {
    Pending,
    Running,
    Completed,
}

crate::simple_display! {
    SubmissionState {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
    }
}

/// A queued payload for the results service (§3, §4.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsSubmission {
    pub id: SubmissionId,
    pub state: SubmissionState,
    pub attempts: u32,
    pub last_attempt_at_epoch_ms: Option<u64>,
    pub machine: String,
    pub project: String,
    pub payload: serde_json::Value,
}
