// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job store's public surface: every mutation is first durably
//! logged, then folded into the in-memory [`MaterializedState`] so
//! readers never have to replay anything themselves (§4.1).
//!
//! A storage fault is never treated as fatal (§7): a failing append is
//! retried on a fixed delay, a single mail notification fires the first
//! time the retry threshold is crossed, and the call blocks until the
//! write finally succeeds rather than dropping the event or surfacing
//! the error to the caller.

use std::path::Path;
use std::thread;
use std::time::Duration;

use autophone_core::devices_ini::DeviceId;
use autophone_core::job::{Job, JobId, ResultsSubmission, SubmissionId, TestItem, TestItemId};
use autophone_core::{Event, StorageFault};
use thiserror::Error;

use crate::checkpoint::{load_snapshot, CheckpointError, Checkpointer};
use crate::migration::MigrationRegistry;
use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};

const RETRY_DELAY: Duration = Duration::from_secs(5);
const NOTIFY_AFTER_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// A one-time alert for a storage fault that has crossed the retry
/// threshold (§7). Implemented by `autophone-adapters::mail` in the
/// running daemon; a no-op implementation is enough for tests.
pub trait StorageFaultNotifier: Send + Sync {
    fn notify_persistent_failure(&self, fault: &StorageFault);
}

pub struct NoopNotifier;

impl StorageFaultNotifier for NoopNotifier {
    fn notify_persistent_failure(&self, _fault: &StorageFault) {}
}

pub struct JobStore {
    wal: Wal,
    state: MaterializedState,
    checkpointer: Checkpointer,
    notifier: Box<dyn StorageFaultNotifier>,
    notified_this_episode: bool,
}

impl JobStore {
    /// Opens the store at `wal_path`/`snapshot_path`, replaying the last
    /// snapshot plus whatever WAL entries postdate it.
    pub fn open(
        wal_path: impl AsRef<Path>,
        snapshot_path: impl Into<std::path::PathBuf>,
        migrations: MigrationRegistry,
        notifier: Box<dyn StorageFaultNotifier>,
    ) -> Result<Self, StoreError> {
        let wal = Wal::open(wal_path)?;
        let snapshot_path = snapshot_path.into();
        let state = load_snapshot(&snapshot_path, &wal, &migrations)?;
        let checkpointer = Checkpointer::new(snapshot_path, migrations);
        Ok(Self {
            wal,
            state,
            checkpointer,
            notifier,
            notified_this_episode: false,
        })
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn open_for_test(wal_path: impl AsRef<Path>, snapshot_path: impl Into<std::path::PathBuf>) -> Result<Self, StoreError> {
        Self::open(wal_path, snapshot_path, MigrationRegistry::new(), Box::new(NoopNotifier))
    }

    pub fn state(&self) -> &MaterializedState {
        &self.state
    }

    /// Folds a snapshot of `state` back to disk and truncates the WAL.
    /// Callers (the daemon's checkpoint timer) decide the cadence.
    pub fn checkpoint(&mut self, now_epoch_ms: u64) -> Result<(), StoreError> {
        self.checkpointer.checkpoint(&mut self.wal, &self.state, now_epoch_ms)?;
        Ok(())
    }

    pub fn enqueue_job(
        &mut self,
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
    ) -> JobId {
        let id = JobId::new();
        let event = Event::JobEnqueued {
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
        };
        self.durable_apply(event);
        id
    }

    pub fn enqueue_test(&mut self, job_id: JobId, name: String, config_file: String, chunk: u32, repos: Vec<String>) -> TestItemId {
        let guid = TestItemId::new();
        self.durable_apply(Event::TestEnqueued {
            guid,
            job_id,
            name,
            config_file,
            chunk,
            repos,
        });
        guid
    }

    /// Claims the oldest pending job for `device_id`, if any, recording
    /// the claim in the log before returning it so a crash between the
    /// claim and the worker starting the job is visible on restart.
    /// Jobs that have already exhausted their attempt budget are purged
    /// first (§4.1) so they never come back around as a claim candidate.
    pub fn claim_next_job(&mut self, device_id: &DeviceId, now_epoch_ms: u64) -> Option<Job> {
        self.purge_exhausted_jobs(device_id);
        let id = self.state.next_job_for_device(device_id)?.id;
        self.durable_apply(Event::JobClaimed {
            id,
            attempt_at_epoch_ms: now_epoch_ms,
        });
        self.state.jobs.get(&id).cloned()
    }

    fn purge_exhausted_jobs(&mut self, device_id: &DeviceId) {
        let exhausted: Vec<JobId> = self
            .state
            .pending_by_device
            .get(device_id)
            .map(|queue| {
                queue
                    .iter()
                    .filter_map(|id| self.state.jobs.get(id))
                    .filter(|job| job.exceeds_max_attempts())
                    .map(|job| job.id)
                    .collect()
            })
            .unwrap_or_default();
        for id in exhausted {
            self.purge_job(id);
        }
    }

    pub fn set_attempts(&mut self, id: JobId, attempts: u32) {
        self.durable_apply(Event::JobAttemptsSet { id, attempts });
    }

    pub fn purge_job(&mut self, id: JobId) {
        self.durable_apply(Event::JobPurged { id });
    }

    pub fn cancel_test(&mut self, guid: TestItemId) {
        self.durable_apply(Event::TestCancelled { guid });
    }

    pub fn complete_test(&mut self, guid: TestItemId) {
        self.durable_apply(Event::TestCompleted { guid });
    }

    pub fn complete_job(&mut self, id: JobId) {
        self.durable_apply(Event::JobCompleted { id });
    }

    pub fn enqueue_submission(&mut self, machine: String, project: String, payload: serde_json::Value) -> SubmissionId {
        let id = SubmissionId::new();
        self.durable_apply(Event::SubmissionEnqueued {
            id,
            machine,
            project,
            payload,
        });
        id
    }

    pub fn claim_next_submission(&mut self, now_epoch_ms: u64) -> Option<ResultsSubmission> {
        let id = self.state.next_submission()?.id;
        self.durable_apply(Event::SubmissionClaimed {
            id,
            attempt_at_epoch_ms: now_epoch_ms,
        });
        self.state.submissions.get(&id).cloned()
    }

    pub fn complete_submission(&mut self, id: SubmissionId) {
        self.durable_apply(Event::SubmissionCompleted { id });
    }

    /// Appends the shutdown marker and flushes, for a clean restart to
    /// find on its next replay.
    pub fn shutdown(&mut self) {
        self.durable_apply(Event::Shutdown);
    }

    /// Appends `event` to the WAL, applies it to in-memory state, and
    /// flushes — retrying indefinitely on a fixed delay if the append
    /// itself fails, with a single mail notification the first time the
    /// retry threshold is crossed for this outage.
    fn durable_apply(&mut self, event: Event) {
        let mut attempt: u32 = 0;
        loop {
            let result = self.wal.append(event.clone()).and_then(|seq| {
                self.wal.flush()?;
                Ok(seq)
            });
            match result {
                Ok(_) => {
                    self.notified_this_episode = false;
                    break;
                }
                Err(err) => {
                    attempt += 1;
                    tracing::error!(attempt, error = %err, "job store append failed, retrying");
                    if attempt >= NOTIFY_AFTER_ATTEMPTS && !self.notified_this_episode {
                        self.notifier.notify_persistent_failure(&StorageFault(err.to_string()));
                        self.notified_this_episode = true;
                    }
                    thread::sleep(RETRY_DELAY);
                }
            }
        }
        self.state.apply_event(&event);
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
