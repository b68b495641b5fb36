// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory materialization of the job store, built by folding
//! [`Event`]s over an initially-empty [`MaterializedState`]. Every
//! handler here must be idempotent: during replay after a restart the
//! same event may be applied a second time on top of state that already
//! reflects it (it was applied once for immediate in-process visibility
//! when it was appended, and again when the WAL is replayed from the
//! last snapshot), so handlers assign rather than increment/decrement
//! and guard transitions with existence/status checks instead of
//! assuming a clean starting point.

use std::collections::HashMap;

use autophone_core::job::{BuildEvent, Job, JobId, ResultsSubmission, SubmissionId, SubmissionState, TestItem, TestItemId};
use autophone_core::{DeviceId, Event};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializedState {
    pub jobs: HashMap<JobId, Job>,
    pub tests: HashMap<TestItemId, TestItem>,
    pub submissions: HashMap<SubmissionId, ResultsSubmission>,
    /// Jobs not yet claimed by a device worker, in enqueue order, keyed
    /// by device so `claim_next` can scan one device's queue at a time.
    pub pending_by_device: HashMap<DeviceId, Vec<JobId>>,
    pub pending_submissions: Vec<SubmissionId>,
}

impl MaterializedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event into the state. Unknown-ID references (a
    /// `TestCompleted` for a guid that was since purged, say) are
    /// silently ignored rather than treated as an error — replay must
    /// never fail on data that was valid when the event was written.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::JobEnqueued {
                id,
                device_id,
                created_at_epoch_ms,
                build_url,
                build_id,
                changeset,
                tree,
                revision,
                revision_hash,
                enable_unittests,
                is_try,
            } => self.apply_job_enqueued(
                *id,
                device_id.clone(),
                *created_at_epoch_ms,
                build_url.clone(),
                build_id.clone(),
                changeset.clone(),
                tree.clone(),
                revision.clone(),
                revision_hash.clone(),
                *enable_unittests,
                *is_try,
            ),
            Event::TestEnqueued {
                guid,
                job_id,
                name,
                config_file,
                chunk,
                repos,
            } => self.apply_test_enqueued(*guid, *job_id, name.clone(), config_file.clone(), *chunk, repos.clone()),
            Event::JobClaimed { id, attempt_at_epoch_ms } => self.apply_job_claimed(*id, *attempt_at_epoch_ms),
            Event::JobAttemptsSet { id, attempts } => self.apply_job_attempts_set(*id, *attempts),
            Event::JobPurged { id } => self.apply_job_purged(*id),
            Event::TestCancelled { guid } => self.apply_test_cancelled(*guid),
            Event::TestCompleted { guid } => self.apply_test_completed(*guid),
            Event::JobCompleted { id } => self.apply_job_completed(*id),
            Event::SubmissionEnqueued {
                id,
                machine,
                project,
                payload,
            } => self.apply_submission_enqueued(*id, machine.clone(), project.clone(), payload.clone()),
            Event::SubmissionClaimed { id, attempt_at_epoch_ms } => {
                self.apply_submission_claimed(*id, *attempt_at_epoch_ms)
            }
            Event::SubmissionCompleted { id } => self.apply_submission_completed(*id),
            // Control/observability events that don't mutate persisted state.
            Event::Shutdown | Event::TimerStart { .. } => {}
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_job_enqueued(
        &mut self,
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
    ) {
        if self.jobs.contains_key(&id) {
            return;
        }
        self.jobs.insert(
            id,
            Job {
                id,
                created_at_epoch_ms,
                last_attempt_at_epoch_ms: None,
                build_url,
                build_id,
                changeset,
                tree,
                revision,
                revision_hash,
                enable_unittests,
                attempts: 0,
                device_id: device_id.clone(),
                is_try,
            },
        );
        let queue = self.pending_by_device.entry(device_id).or_default();
        if !queue.contains(&id) {
            queue.push(id);
        }
    }

    fn apply_test_enqueued(
        &mut self,
        guid: TestItemId,
        job_id: JobId,
        name: String,
        config_file: String,
        chunk: u32,
        repos: Vec<String>,
    ) {
        self.tests.entry(guid).or_insert(TestItem {
            guid,
            job_id,
            name,
            config_file,
            chunk,
            repos,
            cancelled: false,
        });
    }

    /// Removes the job from its device's pending queue and counts the
    /// attempt; idempotent on both counts, since `Vec::retain` is a
    /// no-op once the id is already absent and the attempt only counts
    /// once per distinct `attempt_at_epoch_ms` (replaying the same
    /// `JobClaimed` event must not double-charge the attempt budget).
    fn apply_job_claimed(&mut self, id: JobId, attempt_at_epoch_ms: u64) {
        if let Some(job) = self.jobs.get_mut(&id) {
            if job.last_attempt_at_epoch_ms != Some(attempt_at_epoch_ms) {
                job.attempts += 1;
            }
            job.last_attempt_at_epoch_ms = Some(attempt_at_epoch_ms);
            let device_id = job.device_id.clone();
            if let Some(queue) = self.pending_by_device.get_mut(&device_id) {
                queue.retain(|j| *j != id);
            }
        }
    }

    /// Assigns rather than increments: replaying the same
    /// `JobAttemptsSet` twice must land on the same count, not double it.
    fn apply_job_attempts_set(&mut self, id: JobId, attempts: u32) {
        if let Some(job) = self.jobs.get_mut(&id) {
            job.attempts = attempts;
        }
    }

    fn apply_job_purged(&mut self, id: JobId) {
        if let Some(job) = self.jobs.remove(&id) {
            if let Some(queue) = self.pending_by_device.get_mut(&job.device_id) {
                queue.retain(|j| *j != id);
            }
        }
        self.tests.retain(|_, t| t.job_id != id);
    }

    fn apply_test_cancelled(&mut self, guid: TestItemId) {
        if let Some(test) = self.tests.get_mut(&guid) {
            test.cancelled = true;
        }
    }

    fn apply_test_completed(&mut self, guid: TestItemId) {
        self.tests.remove(&guid);
    }

    fn apply_job_completed(&mut self, id: JobId) {
        if let Some(job) = self.jobs.remove(&id) {
            if let Some(queue) = self.pending_by_device.get_mut(&job.device_id) {
                queue.retain(|j| j != &id);
            }
        }
    }

    fn apply_submission_enqueued(
        &mut self,
        id: SubmissionId,
        machine: String,
        project: String,
        payload: serde_json::Value,
    ) {
        if self.submissions.contains_key(&id) {
            return;
        }
        self.submissions.insert(
            id,
            ResultsSubmission {
                id,
                machine,
                project,
                payload,
                state: SubmissionState::Pending,
                last_attempt_at_epoch_ms: None,
                attempts: 0,
            },
        );
        if !self.pending_submissions.contains(&id) {
            self.pending_submissions.push(id);
        }
    }

    fn apply_submission_claimed(&mut self, id: SubmissionId, attempt_at_epoch_ms: u64) {
        if let Some(sub) = self.submissions.get_mut(&id) {
            if sub.state != SubmissionState::Running {
                sub.attempts += 1;
            }
            sub.state = SubmissionState::Running;
            sub.last_attempt_at_epoch_ms = Some(attempt_at_epoch_ms);
        }
        self.pending_submissions.retain(|s| *s != id);
    }

    fn apply_submission_completed(&mut self, id: SubmissionId) {
        if let Some(sub) = self.submissions.get_mut(&id) {
            sub.state = SubmissionState::Completed;
        }
        self.pending_submissions.retain(|s| *s != id);
    }

    /// The next job for `device_id`, preferring try builds over regular
    /// builds and otherwise FIFO within each group (§4.1, §5: "try
    /// builds jump the regular queue but don't starve it"), skipping any
    /// job that has already exceeded its attempt budget (callers are
    /// expected to have purged those, but a defensive skip costs
    /// nothing).
    pub fn next_job_for_device(&self, device_id: &DeviceId) -> Option<&Job> {
        let queue = self.pending_by_device.get(device_id)?;
        let mut candidates = queue.iter().filter_map(|id| self.jobs.get(id)).filter(|job| !job.exceeds_max_attempts());
        let mut first_regular = None;
        for job in candidates.by_ref() {
            if job.is_try {
                return Some(job);
            }
            if first_regular.is_none() {
                first_regular = Some(job);
            }
        }
        first_regular
    }

    pub fn next_submission(&self) -> Option<&ResultsSubmission> {
        self.pending_submissions.iter().find_map(|id| self.submissions.get(id))
    }

    /// The non-cancelled test items belonging to `job_id`, in no
    /// particular order (callers that need a stable order should sort
    /// by `chunk`).
    pub fn tests_for_job(&self, job_id: JobId) -> Vec<&TestItem> {
        self.tests.values().filter(|t| t.job_id == job_id && !t.cancelled).collect()
    }
}

/// Fields of a parsed `BuildEvent` carried alongside `JobEnqueued` when
/// constructing the event from a pulse message; kept here rather than in
/// `autophone-core` since it is a storage-layer translation concern, not
/// part of the durable vocabulary itself.
pub fn job_enqueued_event(id: JobId, device_id: DeviceId, created_at_epoch_ms: u64, build: &BuildEvent) -> Event {
    Event::JobEnqueued {
        id,
        device_id,
        created_at_epoch_ms,
        build_url: build.package_url.clone(),
        build_id: build.build_id.clone(),
        changeset: build.changeset.clone(),
        tree: build.tree.clone(),
        revision: build.revision.clone(),
        revision_hash: build.revision_hash.clone(),
        enable_unittests: false,
        is_try: build.is_try(),
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
