// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orderly shutdown (§4.3, §6): record the shutdown event so replay
//! sees it, checkpoint, then remove the breadcrumb and PID file so the
//! next startup doesn't mistake this exit for a crash. The lock file is
//! released by dropping it, which the caller does after this returns.

use std::path::Path;

use autophone_storage::JobStore;

pub fn shutdown(store: &mut JobStore, cache_dir: &Path, now_epoch_ms: u64) {
    store.shutdown();
    if let Err(err) = store.checkpoint(now_epoch_ms) {
        tracing::error!(error = %err, "checkpoint during shutdown failed");
    }
    let _ = std::fs::remove_file(cache_dir.join("autophone.running"));
    let _ = std::fs::remove_file(cache_dir.join("autophone.pid"));
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
