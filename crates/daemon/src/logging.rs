// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured logging setup (§6): daily-rotated log files under the
//! configured logfile's directory, a 7-day retention sweep run once at
//! startup, and an `EnvFilter` seeded from the configured log level.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing_subscriber::EnvFilter;

const RETENTION: Duration = Duration::from_secs(7 * 24 * 3600);

/// Initializes the global tracing subscriber, writing daily-rotated
/// files to `log_dir` (named from `file_stem`) and returns the guard
/// that must be kept alive for the life of the process to flush the
/// non-blocking writer.
pub fn init(log_dir: &Path, file_stem: &str, loglevel: &str) -> tracing_appender::non_blocking::WorkerGuard {
    std::fs::create_dir_all(log_dir).ok();
    let appender = tracing_appender::rolling::daily(log_dir, file_stem);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_new(loglevel).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
    guard
}

/// Deletes rotated log files under `log_dir` whose name starts with
/// `file_stem` and whose modification time is older than 7 days.
/// Errors reading an individual entry are skipped rather than aborting
/// the sweep.
pub fn sweep_old_logs(log_dir: &Path, file_stem: &str) {
    sweep_before(log_dir, file_stem, SystemTime::now() - RETENTION);
}

fn sweep_before(log_dir: &Path, file_stem: &str, cutoff: SystemTime) {
    let Ok(entries) = std::fs::read_dir(log_dir) else { return };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(file_stem) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        let Ok(modified) = metadata.modified() else { continue };
        if modified < cutoff {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
