// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The device worker (§4.2): one [`tokio`] task per device, cycling
//! through STARTING → RUNNING → (claim a job, fetch the build, install
//! it, wait out a low battery, run its tests, enqueue a results
//! submission, repeat) → SHUTTINGDOWN/STOPPING → SHUTDOWN. A worker
//! never lets a device fault escape its own loop (§7): every fault is
//! classified and turned into a state transition or a retry, not a
//! propagated error. Results themselves are handed off as PENDING
//! submission rows; a separate results submitter drains and POSTs them.
//!
//! The supervisor never reaches into a worker's state directly — it
//! talks to it exclusively through a [`WorkerCommand`] channel, the
//! same `mpsc` + `select!` shape used for the daemon's other
//! command-driven loops.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use autophone_adapters::{BuildCacheClient, DeviceController};
use autophone_core::job::{Job, JobId, TestItem, TestItemId, TestResult, MAX_ATTEMPTS};
use autophone_core::{Clock, DeviceFault, DeviceId, ProcessState};
use autophone_storage::JobStore;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::crash_budget::CrashBudget;
use crate::harness::{TestHarness, TestOutcome};
use crate::health;
use crate::install::{install_build, FENNEC_PACKAGE};

const IDLE_POLL: Duration = Duration::from_secs(10);
const MAX_CRASHES: u32 = 5;
const CRASH_WINDOW_SECS: u64 = 3600;
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// The device-specific knobs a worker needs at every retry point (§4.2,
/// §6): how hard to retry a flaky adb call, and the battery band a
/// device must sit in before a test run starts.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub phone_retry_limit: u32,
    pub phone_retry_wait: Duration,
    pub battery_min: u8,
    pub battery_max: u8,
    pub device_test_root: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            phone_retry_limit: 3,
            phone_retry_wait: Duration::from_secs(15),
            battery_min: 90,
            battery_max: 95,
            device_test_root: "/data/local/tests".to_string(),
        }
    }
}

/// Every way the Command Console (§6) reaches into a running worker.
/// `Job` is a wake hint only — it carries no payload because a newly
/// enqueued job is already visible through the shared [`JobStore`]; it
/// just interrupts an idle wait so the worker doesn't sit out the rest
/// of `IDLE_POLL` before looking for it.
#[derive(Debug, Clone, Copy)]
pub enum WorkerCommand {
    Shutdown,
    Reboot,
    Disable,
    Enable,
    CancelTest(TestItemId),
    Ping,
    Job,
}

pub struct DeviceWorker<C: Clock> {
    device_id: DeviceId,
    device: Arc<dyn DeviceController>,
    store: Arc<Mutex<JobStore>>,
    clock: C,
    crash_budget: CrashBudget<C>,
    state: ProcessState,
    upload_dir: PathBuf,
    build_dir: PathBuf,
    build_cache: Arc<dyn BuildCacheClient>,
    harness: Arc<dyn TestHarness>,
    settings: WorkerSettings,
    commands: mpsc::Receiver<WorkerCommand>,
}

impl<C: Clock> DeviceWorker<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device_id: DeviceId,
        device: Arc<dyn DeviceController>,
        store: Arc<Mutex<JobStore>>,
        clock: C,
        upload_dir: PathBuf,
        build_dir: PathBuf,
        build_cache: Arc<dyn BuildCacheClient>,
        harness: Arc<dyn TestHarness>,
        settings: WorkerSettings,
    ) -> (Self, mpsc::Sender<WorkerCommand>) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let worker = Self {
            crash_budget: CrashBudget::new(clock.clone(), CRASH_WINDOW_SECS, MAX_CRASHES),
            device_id,
            device,
            store,
            clock,
            state: ProcessState::Starting,
            upload_dir,
            build_dir,
            build_cache,
            harness,
            settings,
            commands: rx,
        };
        (worker, tx)
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Runs until a [`WorkerCommand::Shutdown`] is received or the
    /// crash budget is exhausted. Idle ticks (no job claimed) back off
    /// before polling again so an empty queue doesn't spin, but a
    /// command arriving mid-wait is handled immediately.
    pub async fn run(&mut self) {
        self.state = ProcessState::Running;
        loop {
            self.drain_commands().await;
            if matches!(self.state, ProcessState::Shuttingdown | ProcessState::Stopping) {
                break;
            }
            match self.tick().await {
                Ok(true) => continue,
                Ok(false) => self.idle_wait().await,
                Err(fault) => {
                    tracing::warn!(device_id = %self.device_id, error = %fault, "device worker fault");
                    if self.crash_budget.record_crash() {
                        tracing::error!(device_id = %self.device_id, "crash budget exceeded, disabling device");
                        self.state = ProcessState::Stopping;
                        break;
                    }
                    let _ = self.device.reboot().await;
                    self.idle_wait().await;
                }
            }
        }
        self.state = ProcessState::Shutdown;
    }

    /// Waits out an idle tick, or until a command arrives, whichever
    /// comes first.
    async fn idle_wait(&mut self) {
        tokio::select! {
            _ = tokio::time::sleep(IDLE_POLL) => {}
            cmd = self.commands.recv() => {
                if let Some(cmd) = cmd {
                    self.handle_command(cmd).await;
                }
            }
        }
    }

    async fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            self.handle_command(cmd).await;
        }
    }

    async fn handle_command(&mut self, cmd: WorkerCommand) {
        match cmd {
            WorkerCommand::Shutdown => self.state = ProcessState::Shuttingdown,
            WorkerCommand::Disable => self.state = ProcessState::Stopping,
            WorkerCommand::Enable => {
                if self.state == ProcessState::Stopping {
                    self.state = ProcessState::Running;
                }
            }
            WorkerCommand::Reboot => {
                if let Err(fault) = self.device.reboot().await {
                    tracing::warn!(device_id = %self.device_id, error = %fault, "reboot command failed");
                }
            }
            WorkerCommand::CancelTest(guid) => self.store.lock().cancel_test(guid),
            WorkerCommand::Ping => {
                if let Err(fault) = health::ping(
                    self.device.as_ref(),
                    self.settings.phone_retry_limit,
                    self.settings.phone_retry_wait,
                    &self.settings.device_test_root,
                )
                .await
                {
                    tracing::warn!(device_id = %self.device_id, error = %fault, "ping command failed");
                }
            }
            WorkerCommand::Job => {}
        }
    }

    /// Claims and runs one job if the device has work pending. Returns
    /// `Ok(false)` when the queue is empty.
    async fn tick(&mut self) -> Result<bool, DeviceFault> {
        health::ping(
            self.device.as_ref(),
            self.settings.phone_retry_limit,
            self.settings.phone_retry_wait,
            &self.settings.device_test_root,
        )
        .await?;

        let job = {
            let mut store = self.store.lock();
            store.claim_next_job(&self.device_id, self.clock.epoch_ms())
        };
        let Some(job) = job else {
            return Ok(false);
        };

        self.run_job(&job).await?;
        Ok(true)
    }

    async fn run_job(&mut self, job: &Job) -> Result<(), DeviceFault> {
        let local_apk = match self.fetch_build(job).await {
            Ok(path) => path,
            Err(fault) => {
                self.requeue_after_interrupt(job.id);
                return Err(fault);
            }
        };

        if let Err(fault) = install_build(self.device.as_ref(), &local_apk, self.settings.phone_retry_limit, self.settings.phone_retry_wait).await {
            self.requeue_after_interrupt(job.id);
            return Err(fault);
        }

        if let Err(fault) = self.await_battery().await {
            self.requeue_after_interrupt(job.id);
            return Err(fault);
        }

        let tests = {
            let store = self.store.lock();
            let mut items: Vec<TestItem> = store.state().tests_for_job(job.id).into_iter().cloned().collect();
            items.sort_by(|a, b| a.name.cmp(&b.name));
            items
        };

        for test in tests {
            self.drain_commands().await;
            if matches!(self.state, ProcessState::Shuttingdown | ProcessState::Stopping) {
                self.requeue_after_interrupt(job.id);
                return Ok(());
            }
            self.run_test(job, &test).await;
        }

        let _ = self.device.uninstall_app(FENNEC_PACKAGE).await;
        self.store.lock().complete_job(job.id);
        Ok(())
    }

    async fn fetch_build(&self, job: &Job) -> Result<String, DeviceFault> {
        let bytes = self
            .build_cache
            .fetch(&job.build_url)
            .await
            .map_err(|fault| DeviceFault::Transient(fault.0))?;
        let local_apk = self.build_dir.join(format!("{}.apk", job.id));
        if let Some(parent) = local_apk.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| DeviceFault::Transient(err.to_string()))?;
        }
        tokio::fs::write(&local_apk, &bytes)
            .await
            .map_err(|err| DeviceFault::Transient(err.to_string()))?;
        Ok(local_apk.to_string_lossy().into_owned())
    }

    /// Waits for the device to reach `battery_max` if it started the
    /// job below `battery_min` (§4.2, §9: 90%/95% by default), so a
    /// test run doesn't start on a phone that's about to die mid-suite.
    async fn await_battery(&self) -> Result<(), DeviceFault> {
        let mut level = self.device.get_battery_percentage().await?;
        if level >= self.settings.battery_min {
            return Ok(());
        }
        tracing::warn!(device_id = %self.device_id, level, min = self.settings.battery_min, "battery low, waiting to charge");
        for _ in 0..self.settings.phone_retry_limit.max(1) {
            tokio::time::sleep(self.settings.phone_retry_wait).await;
            level = self.device.get_battery_percentage().await?;
            if level >= self.settings.battery_max {
                return Ok(());
            }
        }
        Err(DeviceFault::Transient(format!("battery still at {level}% after waiting to charge")))
    }

    /// Restores the job's attempt count to one less than its current
    /// value so an interrupted-not-failed job doesn't burn a retry
    /// (§7: "attempts are restored via `set_attempts(job, attempts - 1)`").
    fn requeue_after_interrupt(&mut self, job_id: JobId) {
        let mut store = self.store.lock();
        if let Some(job) = store.state().jobs.get(&job_id) {
            let attempts = job.attempts.saturating_sub(1);
            store.set_attempts(job_id, attempts);
        }
    }

    /// Runs one test item through the harness and submits its result.
    /// A test cancelled after the job's test list was snapshotted is
    /// re-checked live, since [`autophone_storage::state::MaterializedState::tests_for_job`]
    /// only filters cancellations that landed before the snapshot was
    /// taken. A device-level failure (BUSTED/EXCEPTION) on a job that
    /// hasn't exhausted its attempt budget is resubmitted as a new job
    /// scoped to just this one test, under a fresh guid (§4.2, §7).
    async fn run_test(&mut self, job: &Job, test: &TestItem) {
        let cancelled = self.store.lock().state().tests.get(&test.guid).map(|t| t.cancelled).unwrap_or(false);
        if cancelled {
            self.finish_test(job, test, TestResult::Usercancel).await;
            return;
        }

        let result = self.execute_test(test).await;
        if matches!(result, TestResult::Busted | TestResult::Exception) {
            let _ = health::collect_anr_traces(self.device.as_ref(), &self.upload_dir).await;
        }

        let final_result = if matches!(result, TestResult::Busted | TestResult::Exception) && job.attempts < MAX_ATTEMPTS {
            self.requeue_single_test_as_new_job(job, test);
            TestResult::Retry
        } else {
            result
        };
        self.finish_test(job, test, final_result).await;
    }

    async fn execute_test(&self, test: &TestItem) -> TestResult {
        if let Err(fault) = self.harness.setup_job(self.device.as_ref(), test).await {
            tracing::warn!(device_id = %self.device_id, test = %test.name, error = %fault, "test setup failed");
            return TestResult::Exception;
        }

        let outcome = self.harness.run_job(self.device.as_ref(), test).await;

        if let Err(fault) = self.harness.teardown_job(self.device.as_ref(), test).await {
            tracing::warn!(device_id = %self.device_id, test = %test.name, error = %fault, "test teardown failed");
        }

        match outcome {
            Ok(TestOutcome::Pass) => TestResult::Success,
            Ok(TestOutcome::Fail) => TestResult::Testfailed,
            Err(DeviceFault::Disconnected) => TestResult::Busted,
            Err(DeviceFault::Permanent { .. }) => TestResult::Busted,
            Err(DeviceFault::Transient(_)) => TestResult::Exception,
        }
    }

    fn requeue_single_test_as_new_job(&mut self, job: &Job, test: &TestItem) {
        let mut store = self.store.lock();
        let new_job_id = store.enqueue_job(
            job.device_id,
            self.clock.epoch_ms(),
            job.build_url.clone(),
            job.build_id.clone(),
            job.changeset.clone(),
            job.tree.clone(),
            job.revision.clone(),
            job.revision_hash.clone(),
            job.enable_unittests,
            job.is_try,
        );
        store.enqueue_test(new_job_id, test.name.clone(), test.config_file.clone(), test.chunk, test.repos.clone());
    }

    async fn finish_test(&mut self, job: &Job, test: &TestItem, result: TestResult) {
        let payload = serde_json::json!({
            "job_id": job.id.to_string(),
            "test": test.name,
            "result": result.to_string(),
        });
        let mut store = self.store.lock();
        store.enqueue_submission(self.device_id.to_string(), job.tree.clone(), payload);
        store.complete_test(test.guid);
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
