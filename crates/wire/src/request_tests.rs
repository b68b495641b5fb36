// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn empty_line_is_rejected() {
    assert_eq!(Request::parse("   "), Err(RequestError::Empty));
}

#[test]
fn unknown_verb_is_rejected() {
    assert_eq!(Request::parse("autophone-frobnicate"), Err(RequestError::UnknownVerb("autophone-frobnicate".into())));
}

#[yare::parameterized(
    status = { "autophone-status", Request::Status },
    restart = { "autophone-restart", Request::Restart },
    shutdown = { "autophone-shutdown", Request::Shutdown },
    stop = { "autophone-stop", Request::Stop },
)]
fn bare_verbs_parse_with_no_arguments(line: &str, expected: Request) {
    assert_eq!(Request::parse(line).unwrap(), expected);
}

#[test]
fn add_device_requires_a_serial() {
    assert_eq!(
        Request::parse("autophone-add-device"),
        Err(RequestError::MissingArgument { verb: "autophone-add-device" })
    );
    assert_eq!(
        Request::parse("autophone-add-device emulator-5554").unwrap(),
        Request::AddDevice { serial: "emulator-5554".to_string() }
    );
}

#[test]
fn triggerjobs_parses_its_json_payload() {
    let req = Request::parse(r#"autophone-triggerjobs {"build_url": "https://x"}"#).unwrap();
    assert_eq!(req, Request::TriggerJobs { payload: json!({"build_url": "https://x"}) });
}

#[test]
fn triggerjobs_rejects_malformed_json() {
    assert!(matches!(
        Request::parse("autophone-triggerjobs {not json}"),
        Err(RequestError::InvalidJson { verb: "autophone-triggerjobs", .. })
    ));
}

#[test]
fn log_captures_the_remainder_of_the_line() {
    let req = Request::parse("autophone-log device nexus-1 rebooted").unwrap();
    assert_eq!(req, Request::Log { message: "device nexus-1 rebooted".to_string() });
}

#[test]
fn device_verb_parses_target_and_args() {
    let req = Request::parse("device-reboot nexus-1").unwrap();
    assert_eq!(
        req,
        Request::Device {
            target: DeviceTarget::Id("nexus-1".to_string()),
            verb: "reboot".to_string(),
            args: vec![],
        }
    );
}

#[test]
fn device_verb_accepts_all_target_and_extra_args() {
    let req = Request::parse("device-shell all echo hi").unwrap();
    assert_eq!(
        req,
        Request::Device {
            target: DeviceTarget::All,
            verb: "shell".to_string(),
            args: vec!["echo".to_string(), "hi".to_string()],
        }
    );
}

#[test]
fn device_verb_requires_a_target() {
    assert_eq!(
        Request::parse("device-reboot"),
        Err(RequestError::MissingArgument { verb: "device-*" })
    );
}

#[yare::parameterized(
    status = { Request::Status, "autophone-status\n" },
    add_device = { Request::AddDevice { serial: "emulator-5554".to_string() }, "autophone-add-device emulator-5554\n" },
    shutdown = { Request::Shutdown, "autophone-shutdown\n" },
    device_with_args = {
        Request::Device { target: DeviceTarget::All, verb: "shell".to_string(), args: vec!["echo".to_string(), "hi".to_string()] },
        "device-shell all echo hi\n",
    },
)]
fn to_line_round_trips_through_parse(request: Request, expected_line: &str) {
    assert_eq!(request.to_line(), expected_line);
    assert_eq!(Request::parse(expected_line).unwrap(), request);
}
