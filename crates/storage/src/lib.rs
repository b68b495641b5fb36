// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! autophone-storage: the durable job store (§4.1, §6). A write-ahead
//! log plus periodic snapshots back a single [`state::MaterializedState`],
//! wrapped by [`store::JobStore`] for callers.

pub mod checkpoint;
pub mod migration;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod wal;

pub use checkpoint::{load_snapshot, CheckpointError, Checkpointer};
pub use migration::{Migration, MigrationError, MigrationRegistry};
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::MaterializedState;
pub use store::{JobStore, NoopNotifier, StorageFaultNotifier, StoreError};
pub use wal::{Wal, WalEntry, WalError};
