// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fs;
use std::thread::sleep;
use std::time::{Duration, SystemTime};

use tempfile::tempdir;

use super::*;

#[test]
fn sweep_removes_only_files_older_than_the_cutoff() {
    let dir = tempdir().unwrap();
    let stale = dir.path().join("autophone.2026-01-01.log");
    let unrelated = dir.path().join("other.log");
    fs::write(&stale, "old").unwrap();
    fs::write(&unrelated, "ignore me").unwrap();

    sleep(Duration::from_millis(20));
    let cutoff = SystemTime::now();
    sleep(Duration::from_millis(20));

    let fresh = dir.path().join("autophone.2026-07-30.log");
    fs::write(&fresh, "new").unwrap();

    sweep_before(dir.path(), "autophone", cutoff);

    assert!(!stale.exists());
    assert!(fresh.exists());
    assert!(unrelated.exists());
}
