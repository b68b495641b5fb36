// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The external test-framework contract (§4.2): a device worker never
//! runs `am instrument` itself. It hands the device and a [`TestItem`]
//! to a [`TestHarness`], which stages whatever the test package needs
//! (`setup_job`), runs it (`run_job`), and cleans up (`teardown_job`).
//! This mirrors how the pack's own remote test runner separates
//! per-test setup/execution/teardown instead of shelling a single
//! instrumentation command.

use async_trait::async_trait;
use autophone_core::job::TestItem;
use autophone_core::DeviceFault;

use autophone_adapters::DeviceController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    Pass,
    Fail,
}

#[async_trait]
pub trait TestHarness: Send + Sync {
    async fn setup_job(&self, device: &dyn DeviceController, test: &TestItem) -> Result<(), DeviceFault>;
    async fn run_job(&self, device: &dyn DeviceController, test: &TestItem) -> Result<TestOutcome, DeviceFault>;
    async fn teardown_job(&self, device: &dyn DeviceController, test: &TestItem) -> Result<(), DeviceFault>;
}

/// Stages a test's config file under `/data/local/tmp`, runs it through
/// `am instrument`, then removes the staged config again.
pub struct ShellTestHarness;

fn staged_config_path(test: &TestItem) -> String {
    format!("/data/local/tmp/{}", test.config_file)
}

#[async_trait]
impl TestHarness for ShellTestHarness {
    async fn setup_job(&self, device: &dyn DeviceController, test: &TestItem) -> Result<(), DeviceFault> {
        device.push(&test.config_file, &staged_config_path(test)).await
    }

    async fn run_job(&self, device: &dyn DeviceController, test: &TestItem) -> Result<TestOutcome, DeviceFault> {
        let output = device.shell(&format!("am instrument -w {}", test.name)).await?;
        if output.contains("FAILURES!!!") {
            Ok(TestOutcome::Fail)
        } else {
            Ok(TestOutcome::Pass)
        }
    }

    async fn teardown_job(&self, device: &dyn DeviceController, test: &TestItem) -> Result<(), DeviceFault> {
        device.rm(&staged_config_path(test), false, true).await
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;

    pub struct FakeTestHarness {
        outcome: Mutex<TestOutcome>,
        setup_failure: Mutex<Option<DeviceFault>>,
        run_failure: Mutex<Option<DeviceFault>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTestHarness {
        pub fn new() -> Self {
            Self {
                outcome: Mutex::new(TestOutcome::Pass),
                setup_failure: Mutex::new(None),
                run_failure: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn set_outcome(&self, outcome: TestOutcome) {
            *self.outcome.lock() = outcome;
        }

        pub fn fail_setup(&self, fault: DeviceFault) {
            *self.setup_failure.lock() = Some(fault);
        }

        pub fn fail_run(&self, fault: DeviceFault) {
            *self.run_failure.lock() = Some(fault);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl TestHarness for FakeTestHarness {
        async fn setup_job(&self, _device: &dyn DeviceController, test: &TestItem) -> Result<(), DeviceFault> {
            self.calls.lock().push(format!("setup_job {}", test.name));
            match self.setup_failure.lock().take() {
                Some(fault) => Err(fault),
                None => Ok(()),
            }
        }

        async fn run_job(&self, _device: &dyn DeviceController, test: &TestItem) -> Result<TestOutcome, DeviceFault> {
            self.calls.lock().push(format!("run_job {}", test.name));
            match self.run_failure.lock().take() {
                Some(fault) => Err(fault),
                None => Ok(*self.outcome.lock()),
            }
        }

        async fn teardown_job(&self, _device: &dyn DeviceController, test: &TestItem) -> Result<(), DeviceFault> {
            self.calls.lock().push(format!("teardown_job {}", test.name));
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "harness_tests.rs"]
mod tests;
