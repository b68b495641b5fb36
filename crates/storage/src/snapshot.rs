// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic point-in-time capture of [`MaterializedState`], so recovery
//! after a restart only has to replay the WAL entries written since the
//! last snapshot rather than the entire log from the beginning.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::migration::{MigrationError, MigrationRegistry};
use crate::state::MaterializedState;

pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;
const MAX_BAK_FILES: usize = 3;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot migration error: {0}")]
    Migration(#[from] MigrationError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// The highest WAL sequence number reflected in `state`. Replay after
    /// loading a snapshot only needs entries with `seq > seq`.
    pub seq: u64,
    pub state: MaterializedState,
    pub created_at_epoch_ms: u64,
}

impl Snapshot {
    pub fn new(seq: u64, state: MaterializedState, created_at_epoch_ms: u64) -> Self {
        Self {
            version: CURRENT_SNAPSHOT_VERSION,
            seq,
            state,
            created_at_epoch_ms,
        }
    }

    /// Writes a zstd-compressed JSON snapshot to `path`, rotating any
    /// existing file into the `.bak` generation chain first so a crash
    /// mid-write never destroys the last good snapshot.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if path.exists() {
            rotate_bak(path)?;
        }
        let json = serde_json::to_vec(self)?;
        let compressed = zstd::stream::encode_all(json.as_slice(), 0)?;
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        file.write_all(&compressed)?;
        file.flush()?;
        Ok(())
    }

    /// Reads a snapshot from `path`, migrating it forward to
    /// [`CURRENT_SNAPSHOT_VERSION`] if it was written by an older binary.
    pub fn read_from(path: impl AsRef<Path>, migrations: &MigrationRegistry) -> Result<Option<Self>, SnapshotError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let mut compressed = Vec::new();
        File::open(path)?.read_to_end(&mut compressed)?;
        let json = zstd::stream::decode_all(compressed.as_slice())?;
        let mut value: serde_json::Value = serde_json::from_slice(&json)?;
        let version = value
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as u32;
        if version != CURRENT_SNAPSHOT_VERSION {
            value = migrations.migrate_to(value, version, CURRENT_SNAPSHOT_VERSION)?;
        }
        let snapshot: Snapshot = serde_json::from_value(value)?;
        Ok(Some(snapshot))
    }
}

fn bak_path(path: &Path, generation: usize) -> PathBuf {
    if generation == 1 {
        path.with_extension("bak")
    } else {
        let mut p = path.as_os_str().to_owned();
        p.push(format!(".bak.{generation}"));
        PathBuf::from(p)
    }
}

fn rotate_bak(path: &Path) -> Result<(), SnapshotError> {
    let oldest = bak_path(path, MAX_BAK_FILES);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for generation in (1..MAX_BAK_FILES).rev() {
        let from = bak_path(path, generation);
        if from.exists() {
            fs::rename(&from, bak_path(path, generation + 1))?;
        }
    }
    fs::copy(path, bak_path(path, 1))?;
    Ok(())
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
