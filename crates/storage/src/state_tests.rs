// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use autophone_core::test_support::{fixture_job, fixture_test_item};
use autophone_core::job::SubmissionState;
use serde_json::json;

fn enqueue(state: &mut MaterializedState, device_id: DeviceId) -> JobId {
    let job = fixture_job(device_id.clone());
    let id = job.id;
    state.apply_event(&Event::JobEnqueued {
        id,
        device_id,
        created_at_epoch_ms: job.created_at_epoch_ms,
        build_url: job.build_url,
        build_id: job.build_id,
        changeset: job.changeset,
        tree: job.tree,
        revision: job.revision,
        revision_hash: job.revision_hash,
        enable_unittests: job.enable_unittests,
        is_try: job.is_try,
    });
    id
}

#[test]
fn job_enqueued_is_idempotent_under_replay() {
    let device_id = DeviceId::from("nexus-1".to_string());
    let mut state = MaterializedState::new();
    let id = enqueue(&mut state, device_id.clone());
    let job_before = state.jobs.get(&id).cloned().unwrap();

    // Replay the same event again, as happens when a snapshot predates it.
    state.apply_event(&Event::JobEnqueued {
        id,
        device_id: device_id.clone(),
        created_at_epoch_ms: job_before.created_at_epoch_ms,
        build_url: job_before.build_url.clone(),
        build_id: job_before.build_id.clone(),
        changeset: job_before.changeset.clone(),
        tree: job_before.tree.clone(),
        revision: job_before.revision.clone(),
        revision_hash: job_before.revision_hash.clone(),
        enable_unittests: job_before.enable_unittests,
        is_try: job_before.is_try,
    });

    assert_eq!(state.jobs.len(), 1);
    assert_eq!(state.pending_by_device.get(&device_id).unwrap().len(), 1);
}

#[test]
fn job_claimed_removes_from_pending_queue_once() {
    let device_id = DeviceId::from("nexus-1".to_string());
    let mut state = MaterializedState::new();
    let id = enqueue(&mut state, device_id.clone());

    state.apply_event(&Event::JobClaimed {
        id,
        attempt_at_epoch_ms: 42,
    });
    assert!(state.pending_by_device.get(&device_id).unwrap().is_empty());
    assert_eq!(state.jobs.get(&id).unwrap().last_attempt_at_epoch_ms, Some(42));

    // Replaying claim again must not error or duplicate removal work.
    state.apply_event(&Event::JobClaimed {
        id,
        attempt_at_epoch_ms: 42,
    });
    assert!(state.pending_by_device.get(&device_id).unwrap().is_empty());
}

#[test]
fn job_attempts_set_assigns_not_increments() {
    let device_id = DeviceId::from("nexus-1".to_string());
    let mut state = MaterializedState::new();
    let id = enqueue(&mut state, device_id);

    state.apply_event(&Event::JobAttemptsSet { id, attempts: 2 });
    state.apply_event(&Event::JobAttemptsSet { id, attempts: 2 });
    assert_eq!(state.jobs.get(&id).unwrap().attempts, 2);
}

#[test]
fn job_purged_removes_job_and_its_tests() {
    let device_id = DeviceId::from("nexus-1".to_string());
    let mut state = MaterializedState::new();
    let id = enqueue(&mut state, device_id);
    let test = fixture_test_item(id, "autophone-smoke");
    state.apply_event(&Event::TestEnqueued {
        guid: test.guid,
        job_id: id,
        name: test.name.clone(),
        config_file: test.config_file.clone(),
        chunk: test.chunk,
        repos: test.repos.clone(),
    });

    state.apply_event(&Event::JobPurged { id });
    assert!(state.jobs.get(&id).is_none());
    assert!(state.tests.get(&test.guid).is_none());
}

#[test]
fn next_job_for_device_skips_jobs_over_attempt_budget() {
    let device_id = DeviceId::from("nexus-1".to_string());
    let mut state = MaterializedState::new();
    let id = enqueue(&mut state, device_id.clone());
    state.apply_event(&Event::JobAttemptsSet { id, attempts: 3 });

    assert!(state.next_job_for_device(&device_id).is_none());
}

#[test]
fn next_job_for_device_prefers_a_try_build_over_an_earlier_regular_build() {
    let device_id = DeviceId::from("nexus-1".to_string());
    let mut state = MaterializedState::new();
    let regular_id = enqueue(&mut state, device_id.clone());

    let mut try_job = fixture_job(device_id.clone());
    try_job.is_try = true;
    state.apply_event(&Event::JobEnqueued {
        id: try_job.id,
        device_id: device_id.clone(),
        created_at_epoch_ms: try_job.created_at_epoch_ms,
        build_url: try_job.build_url.clone(),
        build_id: try_job.build_id.clone(),
        changeset: try_job.changeset.clone(),
        tree: try_job.tree.clone(),
        revision: try_job.revision.clone(),
        revision_hash: try_job.revision_hash.clone(),
        enable_unittests: try_job.enable_unittests,
        is_try: true,
    });

    let next = state.next_job_for_device(&device_id).unwrap();
    assert_eq!(next.id, try_job.id);
    assert_ne!(next.id, regular_id);
}

#[test]
fn submission_lifecycle_tracks_pending_then_completed() {
    let mut state = MaterializedState::new();
    let id = SubmissionId::new();
    state.apply_event(&Event::SubmissionEnqueued {
        id,
        machine: "nexus-1".to_string(),
        project: "mozilla-central".to_string(),
        payload: json!({"ok": true}),
    });
    assert_eq!(state.next_submission().unwrap().id, id);

    state.apply_event(&Event::SubmissionClaimed {
        id,
        attempt_at_epoch_ms: 10,
    });
    assert!(state.next_submission().is_none());
    assert_eq!(state.submissions.get(&id).unwrap().state, SubmissionState::Running);
    assert_eq!(state.submissions.get(&id).unwrap().attempts, 1);

    // Replaying claim while already running must not double-count attempts.
    state.apply_event(&Event::SubmissionClaimed {
        id,
        attempt_at_epoch_ms: 10,
    });
    assert_eq!(state.submissions.get(&id).unwrap().attempts, 1);

    state.apply_event(&Event::SubmissionCompleted { id });
    assert_eq!(state.submissions.get(&id).unwrap().state, SubmissionState::Completed);
}

#[test]
fn shutdown_and_timer_events_do_not_mutate_state() {
    let mut state = MaterializedState::new();
    state.apply_event(&Event::Shutdown);
    state.apply_event(&Event::TimerStart { id: "t".into() });
    assert!(state.jobs.is_empty());
    assert!(state.submissions.is_empty());
}
