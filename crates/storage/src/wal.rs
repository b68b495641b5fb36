// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log: a single append-only file of newline-delimited JSON
//! records, each wrapping one [`Event`] with a monotonic sequence number
//! and a processed flag. This is the durability floor for the job store;
//! [`crate::snapshot`] exists only to bound how far back replay has to go.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use autophone_core::Event;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Once this many entries have been appended since the last flush, the
/// caller should flush before doing more work — mirrors the teacher's
/// `needs_flush` batching threshold so a crash loses at most a small
/// window of unflushed appends.
const FLUSH_THRESHOLD: usize = 100;

const MAX_BAK_FILES: usize = 3;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("wal io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wal entry serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
    pub processed: bool,
}

pub struct Wal {
    path: PathBuf,
    file: File,
    entries: Vec<WalEntry>,
    next_seq: u64,
    unflushed: usize,
}

impl Wal {
    /// Opens (creating if absent) the log at `path`, replaying whatever
    /// valid entries precede the first corrupt or non-UTF8 line. A
    /// corrupt tail is never an error: the bad bytes are moved aside to
    /// a rotated `.bak` file and the log resumes from the last good
    /// entry, the way the teacher's WAL tolerates a torn write after an
    /// unclean shutdown.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let (entries, corrupt_tail) = Self::read_entries(&path)?;
        if corrupt_tail {
            Self::rotate_bak(&path)?;
            Self::rewrite(&path, &entries)?;
        }

        let next_seq = entries.last().map(|e| e.seq + 1).unwrap_or(0);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file,
            entries,
            next_seq,
            unflushed: 0,
        })
    }

    /// Returns `(entries, corrupt_tail)`. A line that isn't valid UTF-8
    /// or doesn't parse as a `WalEntry` marks the end of the valid
    /// prefix; everything before it is kept, everything from it onward
    /// (including further lines, even if individually well-formed) is
    /// discarded as suspect.
    fn read_entries(path: &Path) -> Result<(Vec<WalEntry>, bool), WalError> {
        let Ok(file) = File::open(path) else {
            return Ok((Vec::new(), false));
        };
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut corrupt = false;

        for raw in reader.split(b'\n') {
            let raw = raw?;
            if raw.is_empty() {
                continue;
            }
            let Ok(line) = std::str::from_utf8(&raw) else {
                corrupt = true;
                break;
            };
            match serde_json::from_str::<WalEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(_) => {
                    corrupt = true;
                    break;
                }
            }
        }

        Ok((entries, corrupt))
    }

    fn rotate_bak(path: &Path) -> Result<(), WalError> {
        let bak_n = |n: usize| -> PathBuf {
            if n == 1 {
                path.with_extension("bak")
            } else {
                let mut p = path.as_os_str().to_owned();
                p.push(format!(".bak.{n}"));
                PathBuf::from(p)
            }
        };

        if bak_n(MAX_BAK_FILES).exists() {
            fs::remove_file(bak_n(MAX_BAK_FILES))?;
        }
        for n in (1..MAX_BAK_FILES).rev() {
            let from = bak_n(n);
            if from.exists() {
                fs::rename(&from, bak_n(n + 1))?;
            }
        }
        fs::copy(path, bak_n(1))?;
        Ok(())
    }

    fn rewrite(path: &Path, entries: &[WalEntry]) -> Result<(), WalError> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        for entry in entries {
            writeln!(file, "{}", serde_json::to_string(entry)?)?;
        }
        file.flush()?;
        Ok(())
    }

    /// Appends `event` as a new unprocessed entry and returns its
    /// sequence number. Does not itself guarantee durability; call
    /// [`Wal::flush`] (or check [`Wal::needs_flush`]) to fsync.
    pub fn append(&mut self, event: Event) -> Result<u64, WalError> {
        let seq = self.next_seq;
        let entry = WalEntry {
            seq,
            event,
            processed: false,
        };
        writeln!(self.file, "{}", serde_json::to_string(&entry)?)?;
        self.entries.push(entry);
        self.next_seq += 1;
        self.unflushed += 1;
        Ok(seq)
    }

    /// Fsyncs the underlying file and resets the unflushed-entry count.
    pub fn flush(&mut self) -> Result<(), WalError> {
        self.file.flush()?;
        self.file.sync_data()?;
        self.unflushed = 0;
        Ok(())
    }

    /// True once enough entries have accumulated since the last flush
    /// that the caller should flush before continuing.
    pub fn needs_flush(&self) -> bool {
        self.unflushed >= FLUSH_THRESHOLD
    }

    /// The oldest unprocessed entry, if any, in append order.
    pub fn next_unprocessed(&self) -> Option<&WalEntry> {
        self.entries.iter().find(|e| !e.processed)
    }

    /// All entries with `seq > after`, in append order. Used by replay
    /// to pick up from a known high-water mark (e.g. a snapshot's
    /// recorded sequence number).
    pub fn entries_after(&self, after: u64) -> impl Iterator<Item = &WalEntry> {
        self.entries.iter().filter(move |e| e.seq > after)
    }

    /// All entries in append order, processed or not.
    pub fn entries(&self) -> &[WalEntry] {
        &self.entries
    }

    /// Marks `seq` processed in memory. Callers append their own
    /// `processed`-transition as a normal event when they need that
    /// fact to survive a crash; this flag is an in-memory bookkeeping
    /// aid for `next_unprocessed`, not itself replayed.
    pub fn mark_processed(&mut self, seq: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.seq == seq) {
            entry.processed = true;
        }
    }

    /// Drops all entries with `seq < keep_from` from memory and rewrites
    /// the on-disk file to match. Called after a snapshot has durably
    /// captured everything up to `keep_from`.
    pub fn truncate_before(&mut self, keep_from: u64) -> Result<(), WalError> {
        self.entries.retain(|e| e.seq >= keep_from);
        Self::rewrite(&self.path, &self.entries)?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.unflushed = 0;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
