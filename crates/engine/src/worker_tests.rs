// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use autophone_adapters::{FakeBuildCacheClient, FakeDeviceController};
use autophone_core::{DeviceFault, DeviceId, FakeClock};
use autophone_storage::JobStore;
use parking_lot::Mutex;
use tempfile::tempdir;

use super::*;
use crate::harness::fake::FakeTestHarness;

const NO_RETRY_WAIT: Duration = Duration::from_millis(0);

fn test_settings() -> WorkerSettings {
    WorkerSettings {
        phone_retry_limit: 1,
        phone_retry_wait: NO_RETRY_WAIT,
        battery_min: 90,
        battery_max: 95,
        device_test_root: "/data/local/tests".to_string(),
    }
}

fn store(dir: &tempfile::TempDir) -> Arc<Mutex<JobStore>> {
    let wal_path = dir.path().join("jobs.wal");
    let snapshot_path = dir.path().join("jobs.snapshot");
    Arc::new(Mutex::new(JobStore::open_for_test(wal_path, snapshot_path).unwrap()))
}

fn worker(dir: &tempfile::TempDir, device: Arc<dyn DeviceController>) -> (DeviceWorker<FakeClock>, Arc<Mutex<JobStore>>, mpsc::Sender<WorkerCommand>) {
    let store = store(dir);
    let clock = FakeClock::new();
    let build_cache = Arc::new(FakeBuildCacheClient::new());
    build_cache.seed("apk-url", b"fake-apk-bytes".to_vec());
    let harness = Arc::new(FakeTestHarness::new());
    let (worker, tx) = DeviceWorker::new(
        DeviceId::from("device-1"),
        device,
        store.clone(),
        clock,
        dir.path().join("uploads"),
        dir.path().join("builds"),
        build_cache,
        harness,
        test_settings(),
    );
    (worker, store, tx)
}

fn enqueue_job(store: &Arc<Mutex<JobStore>>) -> autophone_core::job::JobId {
    store.lock().enqueue_job(
        DeviceId::from("device-1"),
        1_000,
        "apk-url".into(),
        "build-1".into(),
        "cs".into(),
        "mozilla-central".into(),
        "rev".into(),
        "revhash".into(),
        false,
        false,
    )
}

#[tokio::test]
async fn tick_returns_false_when_queue_is_empty() {
    let dir = tempdir().unwrap();
    let (mut w, _store, _tx) = worker(&dir, Arc::new(FakeDeviceController::new()));
    w.state = ProcessState::Running;
    assert!(!w.tick().await.unwrap());
}

#[tokio::test]
async fn tick_claims_runs_and_completes_a_job_with_no_tests() {
    let dir = tempdir().unwrap();
    let (mut w, store, _tx) = worker(&dir, Arc::new(FakeDeviceController::new()));
    w.state = ProcessState::Running;

    let job_id = enqueue_job(&store);

    assert!(w.tick().await.unwrap());
    assert!(store.lock().state().jobs.get(&job_id).is_none());
}

#[tokio::test]
async fn run_job_runs_every_test_and_enqueues_a_submission_per_test() {
    let dir = tempdir().unwrap();
    let (mut w, store, _tx) = worker(&dir, Arc::new(FakeDeviceController::new()));
    w.state = ProcessState::Running;

    let job_id = enqueue_job(&store);
    store.lock().enqueue_test(job_id, "remote-xul".into(), "remote.ini".into(), 1, vec![]);
    store.lock().enqueue_test(job_id, "remote-webapi".into(), "remote.ini".into(), 1, vec![]);

    assert!(w.tick().await.unwrap());

    assert!(store.lock().state().jobs.get(&job_id).is_none());
    assert_eq!(store.lock().state().pending_submissions.len(), 2);
}

#[tokio::test]
async fn a_device_fault_during_install_restores_the_attempt_count() {
    let dir = tempdir().unwrap();
    let device = FakeDeviceController::new();
    device.fail_when_contains("install_app", DeviceFault::Disconnected);
    let (mut w, store, _tx) = worker(&dir, Arc::new(device));
    w.state = ProcessState::Running;

    let job_id = enqueue_job(&store);

    let err = w.tick().await.unwrap_err();
    assert!(matches!(err, DeviceFault::Disconnected));

    let attempts = store.lock().state().jobs.get(&job_id).unwrap().attempts;
    assert_eq!(attempts, 0);
}

#[tokio::test]
async fn shutdown_state_interrupts_the_test_loop_and_requeues_the_job() {
    let dir = tempdir().unwrap();
    let (mut w, store, _tx) = worker(&dir, Arc::new(FakeDeviceController::new()));
    w.state = ProcessState::Running;

    let job_id = enqueue_job(&store);
    store.lock().enqueue_test(job_id, "remote-xul".into(), "remote.ini".into(), 1, vec![]);

    let job = store.lock().claim_next_job(&DeviceId::from("device-1"), 2_000).unwrap();
    w.state = ProcessState::Shuttingdown;
    w.run_job(&job).await.unwrap();

    let attempts = store.lock().state().jobs.get(&job_id).unwrap().attempts;
    assert_eq!(attempts, 0);
}

#[tokio::test]
async fn a_busted_test_under_the_attempt_budget_is_retried_as_a_fresh_job() {
    let dir = tempdir().unwrap();
    let (mut w, store, _tx) = worker(&dir, Arc::new(FakeDeviceController::new()));
    w.state = ProcessState::Running;

    let job_id = enqueue_job(&store);
    store.lock().enqueue_test(job_id, "remote-xul".into(), "remote.ini".into(), 1, vec![]);

    let fake_harness = FakeTestHarness::new();
    fake_harness.fail_run(DeviceFault::Disconnected);
    w.harness = Arc::new(fake_harness);

    assert!(w.tick().await.unwrap());

    assert!(store.lock().state().jobs.get(&job_id).is_none());
    let jobs_after: Vec<_> = store.lock().state().jobs.values().cloned().collect();
    assert_eq!(jobs_after.len(), 1);
    assert_ne!(jobs_after[0].id, job_id);

    let submissions: Vec<_> = store.lock().state().submissions.values().cloned().collect();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].payload["result"], "retry");
}

#[tokio::test]
async fn a_cancellation_that_lands_after_the_job_tests_snapshot_is_still_honored() {
    let dir = tempdir().unwrap();
    let (mut w, store, _tx) = worker(&dir, Arc::new(FakeDeviceController::new()));
    w.state = ProcessState::Running;

    let job_id = enqueue_job(&store);
    let guid = store.lock().enqueue_test(job_id, "remote-xul".into(), "remote.ini".into(), 1, vec![]);
    let test = store.lock().state().tests.get(&guid).unwrap().clone();
    let job = store.lock().state().jobs.get(&job_id).unwrap().clone();

    store.lock().cancel_test(guid);
    w.run_test(&job, &test).await;

    let submissions: Vec<_> = store.lock().state().submissions.values().cloned().collect();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].payload["result"], "usercancel");
}

#[tokio::test]
async fn a_shutdown_command_is_observed_on_the_next_drain() {
    let dir = tempdir().unwrap();
    let (mut w, _store, tx) = worker(&dir, Arc::new(FakeDeviceController::new()));
    w.state = ProcessState::Running;
    tx.send(WorkerCommand::Shutdown).await.unwrap();

    w.drain_commands().await;
    assert_eq!(w.state(), ProcessState::Shuttingdown);
}

#[tokio::test]
async fn a_cancel_test_command_marks_the_test_cancelled_in_the_store() {
    let dir = tempdir().unwrap();
    let (mut w, store, tx) = worker(&dir, Arc::new(FakeDeviceController::new()));
    w.state = ProcessState::Running;

    let job_id = enqueue_job(&store);
    let guid = store.lock().enqueue_test(job_id, "remote-xul".into(), "remote.ini".into(), 1, vec![]);

    tx.send(WorkerCommand::CancelTest(guid)).await.unwrap();
    w.drain_commands().await;

    assert!(store.lock().state().tests.get(&guid).unwrap().cancelled);
}

#[tokio::test]
async fn a_disable_then_enable_command_resumes_the_running_state() {
    let dir = tempdir().unwrap();
    let (mut w, _store, tx) = worker(&dir, Arc::new(FakeDeviceController::new()));
    w.state = ProcessState::Running;

    tx.send(WorkerCommand::Disable).await.unwrap();
    w.drain_commands().await;
    assert_eq!(w.state(), ProcessState::Stopping);

    tx.send(WorkerCommand::Enable).await.unwrap();
    w.drain_commands().await;
    assert_eq!(w.state(), ProcessState::Running);
}
