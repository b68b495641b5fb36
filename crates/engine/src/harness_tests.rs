// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use autophone_adapters::FakeDeviceController;
use autophone_core::job::{JobId, TestItemId};

fn test_item(name: &str) -> TestItem {
    TestItem {
        guid: TestItemId::new(),
        job_id: JobId::new(),
        name: name.to_string(),
        config_file: format!("{name}.ini"),
        chunk: 1,
        repos: Vec::new(),
        cancelled: false,
    }
}

#[tokio::test]
async fn shell_harness_stages_and_removes_the_config_file() {
    let device = FakeDeviceController::new();
    let harness = ShellTestHarness;
    let test = test_item("autophone-smoke");

    harness.setup_job(&device, &test).await.unwrap();
    assert_eq!(harness.run_job(&device, &test).await.unwrap(), TestOutcome::Pass);
    harness.teardown_job(&device, &test).await.unwrap();

    let calls = device.calls();
    assert!(calls.iter().any(|c| c.contains("push") && c.contains(&test.config_file)));
    assert!(calls.iter().any(|c| c.contains("rm") && c.contains(&test.config_file)));
}

#[tokio::test]
async fn shell_harness_classifies_a_failures_marker_as_fail() {
    let device = FakeDeviceController::new();
    device.set_shell_output(&format!("am instrument -w {}", "autophone-smoke"), "1 Test, 1 Failure\nFAILURES!!!");
    let harness = ShellTestHarness;
    let test = test_item("autophone-smoke");
    assert_eq!(harness.run_job(&device, &test).await.unwrap(), TestOutcome::Fail);
}

#[tokio::test]
async fn fake_harness_records_calls_and_honors_configured_failures() {
    let device = FakeDeviceController::new();
    let harness = fake::FakeTestHarness::new();
    let test = test_item("autophone-smoke");

    harness.setup_job(&device, &test).await.unwrap();
    harness.set_outcome(TestOutcome::Fail);
    assert_eq!(harness.run_job(&device, &test).await.unwrap(), TestOutcome::Fail);
    harness.teardown_job(&device, &test).await.unwrap();

    assert_eq!(
        harness.calls(),
        vec!["setup_job autophone-smoke", "run_job autophone-smoke", "teardown_job autophone-smoke"]
    );
}
