// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Brings the daemon up to the point where it is safe to bind network
//! sockets (§6, §7): acquire the single-instance lock, lay out the
//! cache directory, recover the job store from its last snapshot and
//! WAL, and load the static `devices.ini`/test manifest. Sockets are
//! bound by the caller only after `startup` returns successfully, so a
//! second instance never partially grabs a port before losing the lock
//! race.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use autophone_core::devices_ini::DevicesFile;
use autophone_core::manifest::Manifest;
use autophone_core::Config;
use autophone_storage::{JobStore, MigrationRegistry, NoopNotifier, StoreError};
use fs2::FileExt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("another autophone daemon instance already holds {0}")]
    AlreadyRunning(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("devices.ini is invalid: {0}")]
    DevicesIni(#[from] autophone_core::devices_ini::DevicesIniError),
}

/// Resources a successful startup hands back to `main`.
pub struct Started {
    /// Held for the process lifetime; dropping it releases the lock.
    pub lock: File,
    pub store: JobStore,
    pub devices: DevicesFile,
    pub manifest: Manifest,
}

pub fn startup(config: &Config) -> Result<Started, LifecycleError> {
    fs::create_dir_all(&config.cache_dir)?;
    if let Some(parent) = config.logfile.parent() {
        fs::create_dir_all(parent)?;
    }

    let lock = acquire_lock(&config.cache_dir.join("autophone.lock"))?;
    write_pid_file(&config.cache_dir.join("autophone.pid"))?;
    write_version_file(&config.cache_dir.join("VERSION"))?;
    check_orphan_breadcrumb(&config.cache_dir.join("autophone.running"));
    write_breadcrumb(&config.cache_dir.join("autophone.running"))?;

    let wal_path = config.cache_dir.join("jobs.wal");
    let snapshot_path = config.cache_dir.join("jobs.snapshot");
    let store = JobStore::open(wal_path, snapshot_path, MigrationRegistry::new(), Box::new(NoopNotifier))?;

    let devices_contents = fs::read_to_string(&config.devicescfg).unwrap_or_default();
    let devices = DevicesFile::parse(&devices_contents)?;
    let manifest_contents = fs::read_to_string(&config.test_path).unwrap_or_default();
    let manifest = Manifest::parse(&manifest_contents);

    Ok(Started { lock, store, devices, manifest })
}

/// Takes an exclusive, non-blocking lock on `path`, creating it if
/// necessary. A held lock means another daemon instance is already
/// running against this cache directory.
fn acquire_lock(path: &std::path::Path) -> Result<File, LifecycleError> {
    let file = File::create(path)?;
    file.try_lock_exclusive().map_err(|_| LifecycleError::AlreadyRunning(path.to_path_buf()))?;
    Ok(file)
}

fn write_pid_file(path: &std::path::Path) -> std::io::Result<()> {
    fs::write(path, std::process::id().to_string())
}

fn write_version_file(path: &std::path::Path) -> std::io::Result<()> {
    fs::write(path, env!("CARGO_PKG_VERSION"))
}

/// A breadcrumb left from the prior run is a sign the last shutdown
/// didn't go through the normal path (crash, kill -9, host reboot). Not
/// fatal, just logged so an operator can tell the difference between a
/// clean restart and a recovered crash.
fn check_orphan_breadcrumb(path: &std::path::Path) {
    if path.exists() {
        tracing::warn!(breadcrumb = %path.display(), "previous run left an orphaned breadcrumb; last shutdown may not have been clean");
    }
}

fn write_breadcrumb(path: &std::path::Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    write!(file, "{}", std::process::id())
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
