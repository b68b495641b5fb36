// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema migration for persisted [`crate::snapshot::Snapshot`] payloads.
//! Each [`Migration`] upgrades a `serde_json::Value` by exactly one
//! version; [`MigrationRegistry`] chains them to walk an old snapshot
//! forward to the version the running binary expects.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("snapshot version {0} is newer than this binary's {1}")]
    TooNew(u32, u32),
    #[error("no migration path from version {0} to {1}")]
    NoPath(u32, u32),
}

pub trait Migration: Send + Sync {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, value: &mut serde_json::Value);
}

pub struct MigrationRegistry {
    by_source: HashMap<u32, Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self {
            by_source: HashMap::new(),
        }
    }

    pub fn register(mut self, migration: impl Migration + 'static) -> Self {
        self.by_source.insert(migration.source_version(), Box::new(migration));
        self
    }

    /// Walks `value` forward one migration step at a time until it
    /// reaches `target_version`. Fails if `value`'s version is newer
    /// than `target_version` (a downgrade, never supported) or if no
    /// registered migration continues the chain.
    pub fn migrate_to(
        &self,
        mut value: serde_json::Value,
        mut current_version: u32,
        target_version: u32,
    ) -> Result<serde_json::Value, MigrationError> {
        if current_version > target_version {
            return Err(MigrationError::TooNew(current_version, target_version));
        }
        while current_version < target_version {
            let migration = self
                .by_source
                .get(&current_version)
                .ok_or(MigrationError::NoPath(current_version, target_version))?;
            migration.migrate(&mut value);
            current_version = migration.target_version();
        }
        Ok(value)
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
