// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

struct AddField;

impl Migration for AddField {
    fn source_version(&self) -> u32 {
        1
    }

    fn target_version(&self) -> u32 {
        2
    }

    fn migrate(&self, value: &mut serde_json::Value) {
        value["tests"] = json!({});
    }
}

struct RenameField;

impl Migration for RenameField {
    fn source_version(&self) -> u32 {
        2
    }

    fn target_version(&self) -> u32 {
        3
    }

    fn migrate(&self, value: &mut serde_json::Value) {
        if let Some(obj) = value.as_object_mut() {
            if let Some(v) = obj.remove("tests") {
                obj.insert("test_items".to_string(), v);
            }
        }
    }
}

fn registry() -> MigrationRegistry {
    MigrationRegistry::new().register(AddField).register(RenameField)
}

#[test]
fn migrate_to_same_version_is_noop() {
    let value = json!({"jobs": {}});
    let out = registry().migrate_to(value.clone(), 3, 3).unwrap();
    assert_eq!(out, value);
}

#[test]
fn migrate_to_chains_multiple_steps() {
    let value = json!({"jobs": {}});
    let out = registry().migrate_to(value, 1, 3).unwrap();
    assert!(out.get("test_items").is_some());
    assert!(out.get("tests").is_none());
}

#[test]
fn migrate_to_rejects_newer_than_target() {
    let value = json!({});
    let err = registry().migrate_to(value, 5, 3).unwrap_err();
    assert_eq!(err, MigrationError::TooNew(5, 3));
}

#[test]
fn migrate_to_reports_missing_path() {
    let value = json!({});
    let err = registry().migrate_to(value, 3, 9).unwrap_err();
    assert_eq!(err, MigrationError::NoPath(3, 9));
}
