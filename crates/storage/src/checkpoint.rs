// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ties the WAL and snapshot together: loads the last snapshot plus
//! whatever WAL entries postdate it at startup, and periodically folds
//! the WAL back into a fresh snapshot so replay never has to walk the
//! log from the very beginning.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::migration::MigrationRegistry;
use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Wal(#[from] WalError),
}

/// Loads the last snapshot (if any) and replays every WAL entry with a
/// higher sequence number on top of it, returning the fully recovered
/// state. Used once, at daemon startup.
pub fn load_snapshot(
    snapshot_path: impl AsRef<Path>,
    wal: &Wal,
    migrations: &MigrationRegistry,
) -> Result<MaterializedState, CheckpointError> {
    let snapshot = Snapshot::read_from(snapshot_path, migrations)?;
    match snapshot {
        Some(snapshot) => {
            let mut state = snapshot.state;
            for entry in wal.entries_after(snapshot.seq) {
                state.apply_event(&entry.event);
            }
            Ok(state)
        }
        None => {
            let mut state = MaterializedState::new();
            for entry in wal.entries() {
                state.apply_event(&entry.event);
            }
            Ok(state)
        }
    }
}

pub struct Checkpointer {
    snapshot_path: PathBuf,
    migrations: MigrationRegistry,
}

impl Checkpointer {
    pub fn new(snapshot_path: impl Into<PathBuf>, migrations: MigrationRegistry) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            migrations,
        }
    }

    pub fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        Snapshot::read_from(&self.snapshot_path, &self.migrations)
    }

    /// Writes a fresh snapshot of `state` as of the WAL's highest
    /// sequence number, then truncates the WAL to drop everything at or
    /// before that point. Call periodically (not on every append) since
    /// each call is a full-state serialize and compress.
    pub fn checkpoint(
        &self,
        wal: &mut Wal,
        state: &MaterializedState,
        now_epoch_ms: u64,
    ) -> Result<(), CheckpointError> {
        let seq = wal.entries().last().map(|e| e.seq).unwrap_or(0);
        Snapshot::new(seq, state.clone(), now_epoch_ms).write_to(&self.snapshot_path)?;
        wal.truncate_before(seq + 1)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
