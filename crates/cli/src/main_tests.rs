// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use autophone_wire::DeviceTarget;

use super::*;

#[test]
fn status_and_bare_verbs_need_no_arguments() {
    assert_eq!(build_request(Command::Status).unwrap(), Request::Status);
    assert_eq!(build_request(Command::Restart).unwrap(), Request::Restart);
    assert_eq!(build_request(Command::Shutdown).unwrap(), Request::Shutdown);
    assert_eq!(build_request(Command::Stop).unwrap(), Request::Stop);
}

#[test]
fn add_device_carries_the_serial_through() {
    let request = build_request(Command::AddDevice { serial: "emulator-5554".to_string() }).unwrap();
    assert_eq!(request, Request::AddDevice { serial: "emulator-5554".to_string() });
}

#[test]
fn trigger_jobs_parses_an_inline_json_payload() {
    let request = build_request(Command::TriggerJobs { payload: r#"{"build": "https://x"}"#.to_string() }).unwrap();
    assert_eq!(request, Request::TriggerJobs { payload: serde_json::json!({"build": "https://x"}) });
}

#[test]
fn trigger_jobs_rejects_malformed_json() {
    assert!(build_request(Command::TriggerJobs { payload: "{not json}".to_string() }).is_err());
}

#[test]
fn trigger_jobs_reads_the_payload_from_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payload.json");
    std::fs::write(&path, r#"{"devices": ["nexus-1"]}"#).unwrap();

    let request = build_request(Command::TriggerJobs { payload: format!("@{}", path.display()) }).unwrap();
    assert_eq!(request, Request::TriggerJobs { payload: serde_json::json!({"devices": ["nexus-1"]}) });
}

#[test]
fn log_joins_its_words_with_single_spaces() {
    let request = build_request(Command::Log { message: vec!["device".to_string(), "rebooted".to_string()] }).unwrap();
    assert_eq!(request, Request::Log { message: "device rebooted".to_string() });
}

#[test]
fn device_all_target_parses_as_the_all_variant() {
    let request = build_request(Command::Device { target: "all".to_string(), verb: "reboot".to_string(), args: vec![] }).unwrap();
    assert_eq!(request, Request::Device { target: DeviceTarget::All, verb: "reboot".to_string(), args: vec![] });
}

#[test]
fn device_named_target_parses_as_an_id() {
    let request = build_request(Command::Device { target: "nexus-1".to_string(), verb: "shell".to_string(), args: vec!["echo".to_string()] }).unwrap();
    assert_eq!(
        request,
        Request::Device { target: DeviceTarget::Id("nexus-1".to_string()), verb: "shell".to_string(), args: vec!["echo".to_string()] }
    );
}
