// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use autophone_core::test_support::fixture_job;
use autophone_core::DeviceId;
use std::fs;
use std::io::Write as _;
use tempfile::tempdir;

fn shutdown_after_fixture(dir: &Path) -> PathBuf {
    dir.join("jobs.wal")
}

#[test]
fn append_and_reopen_replays_entries() {
    let dir = tempdir().unwrap();
    let path = shutdown_after_fixture(dir.path());

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append(Event::Shutdown).unwrap();
        wal.append(Event::TimerStart { id: "t1".into() }).unwrap();
        wal.flush().unwrap();
    }

    let wal = Wal::open(&path).unwrap();
    assert_eq!(wal.entries().len(), 2);
    assert_eq!(wal.entries()[0].event, Event::Shutdown);
}

#[test]
fn next_unprocessed_returns_oldest_unmarked() {
    let dir = tempdir().unwrap();
    let path = shutdown_after_fixture(dir.path());
    let mut wal = Wal::open(&path).unwrap();

    let s0 = wal.append(Event::TimerStart { id: "a".into() }).unwrap();
    let s1 = wal.append(Event::TimerStart { id: "b".into() }).unwrap();

    assert_eq!(wal.next_unprocessed().unwrap().seq, s0);
    wal.mark_processed(s0);
    assert_eq!(wal.next_unprocessed().unwrap().seq, s1);
    wal.mark_processed(s1);
    assert!(wal.next_unprocessed().is_none());
}

#[test]
fn entries_after_filters_by_seq() {
    let dir = tempdir().unwrap();
    let path = shutdown_after_fixture(dir.path());
    let mut wal = Wal::open(&path).unwrap();

    for i in 0..5 {
        wal.append(Event::TimerStart { id: i.to_string() }).unwrap();
    }

    let after: Vec<_> = wal.entries_after(2).map(|e| e.seq).collect();
    assert_eq!(after, vec![3, 4]);
}

#[test]
fn truncate_before_drops_old_entries_and_persists() {
    let dir = tempdir().unwrap();
    let path = shutdown_after_fixture(dir.path());
    let mut wal = Wal::open(&path).unwrap();

    for i in 0..5 {
        wal.append(Event::TimerStart { id: i.to_string() }).unwrap();
    }
    wal.truncate_before(3).unwrap();
    assert_eq!(wal.entries().iter().map(|e| e.seq).collect::<Vec<_>>(), vec![3, 4]);

    let reopened = Wal::open(&path).unwrap();
    assert_eq!(reopened.entries().len(), 2);
}

#[test]
fn needs_flush_trips_at_threshold() {
    let dir = tempdir().unwrap();
    let path = shutdown_after_fixture(dir.path());
    let mut wal = Wal::open(&path).unwrap();

    for i in 0..FLUSH_THRESHOLD - 1 {
        wal.append(Event::TimerStart { id: i.to_string() }).unwrap();
    }
    assert!(!wal.needs_flush());
    wal.append(Event::TimerStart { id: "last".into() }).unwrap();
    assert!(wal.needs_flush());
    wal.flush().unwrap();
    assert!(!wal.needs_flush());
}

#[test]
fn corrupt_trailing_line_is_dropped_and_backed_up() {
    let dir = tempdir().unwrap();
    let path = shutdown_after_fixture(dir.path());

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append(Event::Shutdown).unwrap();
        wal.append(Event::TimerStart { id: "ok".into() }).unwrap();
        wal.flush().unwrap();
    }

    // Simulate a torn write: append a non-JSON line with invalid UTF-8.
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"\xff\xfe not json at all\n").unwrap();
    }

    let wal = Wal::open(&path).unwrap();
    assert_eq!(wal.entries().len(), 2);
    assert!(path.with_extension("bak").exists());

    // The original (corrupt) contents are preserved in the .bak file.
    let bak_contents = fs::read(path.with_extension("bak")).unwrap();
    assert!(bak_contents.ends_with(b"not json at all\n"));
}

#[test]
fn bak_rotation_keeps_at_most_three_generations() {
    let dir = tempdir().unwrap();
    let path = shutdown_after_fixture(dir.path());

    for round in 0..5 {
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(Event::TimerStart {
                id: format!("round-{round}"),
            })
            .unwrap();
            wal.flush().unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xff, 0xfe, b'\n']).unwrap();
    }

    assert!(path.with_extension("bak").exists());
    let mut bak2 = path.as_os_str().to_owned();
    bak2.push(".bak.2");
    let mut bak3 = path.as_os_str().to_owned();
    bak3.push(".bak.3");
    let mut bak4 = path.as_os_str().to_owned();
    bak4.push(".bak.4");
    assert!(PathBuf::from(&bak2).exists());
    assert!(PathBuf::from(&bak3).exists());
    assert!(!PathBuf::from(&bak4).exists());
}

#[test]
fn shutdown_event_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = shutdown_after_fixture(dir.path());

    {
        let mut wal = Wal::open(&path).unwrap();
        let device_id = DeviceId::from("nexus-1".to_string());
        let job = fixture_job(device_id.clone());
        wal.append(Event::JobEnqueued {
            id: job.id,
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
        })
        .unwrap();
        wal.append(Event::Shutdown).unwrap();
        wal.flush().unwrap();
    }

    let wal = Wal::open(&path).unwrap();
    assert!(wal.entries().iter().any(|e| e.event == Event::Shutdown));
}
