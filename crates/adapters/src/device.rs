// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The device controller boundary (§4.7): every way a device worker
//! touches a physical phone goes through this trait, so the worker's
//! state machine and health checks can be exercised against
//! [`FakeDeviceController`] without real hardware.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use autophone_core::DeviceFault;
use tokio::process::Command;
use tokio::time::timeout;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait DeviceController: Send + Sync {
    /// Raw connection state as reported by the transport (`device`,
    /// `offline`, `unauthorized`, ...).
    async fn state(&self) -> Result<String, DeviceFault>;
    async fn shell(&self, command: &str) -> Result<String, DeviceFault>;
    async fn exists(&self, path: &str) -> Result<bool, DeviceFault>;
    async fn is_dir(&self, path: &str) -> Result<bool, DeviceFault>;
    async fn chmod(&self, path: &str, mode: &str, recursive: bool) -> Result<(), DeviceFault>;
    async fn rm(&self, path: &str, recursive: bool, force: bool) -> Result<(), DeviceFault>;
    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), DeviceFault>;
    async fn push(&self, local: &str, remote: &str) -> Result<(), DeviceFault>;
    async fn pull(&self, remote: &str, local: &str) -> Result<(), DeviceFault>;
    async fn install_app(&self, local_apk: &str) -> Result<(), DeviceFault>;
    async fn uninstall_app(&self, package: &str) -> Result<(), DeviceFault>;
    async fn is_app_installed(&self, package: &str) -> Result<bool, DeviceFault>;
    async fn get_prop(&self, name: &str) -> Result<String, DeviceFault>;
    async fn get_ip_address(&self) -> Result<Option<String>, DeviceFault>;
    async fn get_battery_percentage(&self) -> Result<u8, DeviceFault>;
    async fn reboot(&self) -> Result<(), DeviceFault>;
    async fn power_on(&self) -> Result<(), DeviceFault>;
    async fn get_logcat(&self) -> Result<String, DeviceFault>;
    async fn process_exist(&self, name: &str) -> Result<bool, DeviceFault>;
    async fn pkill(&self, name: &str) -> Result<(), DeviceFault>;
}

/// Drives a real device over `adb`, identified by its USB/Wi-Fi serial.
pub struct AdbDeviceController {
    serial: String,
}

impl AdbDeviceController {
    pub fn new(serial: impl Into<String>) -> Self {
        Self { serial: serial.into() }
    }

    async fn adb(&self, args: &[&str]) -> Result<String, DeviceFault> {
        let mut full_args = vec!["-s", self.serial.as_str()];
        full_args.extend_from_slice(args);
        let run = Command::new("adb")
            .args(&full_args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = timeout(COMMAND_TIMEOUT, run)
            .await
            .map_err(|_| DeviceFault::Transient(format!("adb {args:?} timed out")))?
            .map_err(|e| DeviceFault::Transient(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("device not found") || stderr.contains("device offline") {
                return Err(DeviceFault::Disconnected);
            }
            return Err(DeviceFault::Transient(stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn shell_raw(&self, command: &str) -> Result<String, DeviceFault> {
        self.adb(&["shell", command]).await
    }
}

#[async_trait]
impl DeviceController for AdbDeviceController {
    async fn state(&self) -> Result<String, DeviceFault> {
        self.adb(&["get-state"]).await
    }

    async fn shell(&self, command: &str) -> Result<String, DeviceFault> {
        self.shell_raw(command).await
    }

    async fn exists(&self, path: &str) -> Result<bool, DeviceFault> {
        let out = self.shell_raw(&format!("[ -e {path} ] && echo yes || echo no")).await?;
        Ok(out.trim() == "yes")
    }

    async fn is_dir(&self, path: &str) -> Result<bool, DeviceFault> {
        let out = self.shell_raw(&format!("[ -d {path} ] && echo yes || echo no")).await?;
        Ok(out.trim() == "yes")
    }

    async fn chmod(&self, path: &str, mode: &str, recursive: bool) -> Result<(), DeviceFault> {
        let flag = if recursive { "-R " } else { "" };
        self.shell_raw(&format!("chmod {flag}{mode} {path}")).await?;
        Ok(())
    }

    async fn rm(&self, path: &str, recursive: bool, force: bool) -> Result<(), DeviceFault> {
        let flags = match (recursive, force) {
            (true, true) => "-rf",
            (true, false) => "-r",
            (false, true) => "-f",
            (false, false) => "",
        };
        self.shell_raw(&format!("rm {flags} {path}")).await?;
        Ok(())
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), DeviceFault> {
        let flag = if recursive { "-p " } else { "" };
        self.shell_raw(&format!("mkdir {flag}{path}")).await?;
        Ok(())
    }

    async fn push(&self, local: &str, remote: &str) -> Result<(), DeviceFault> {
        self.adb(&["push", local, remote]).await?;
        Ok(())
    }

    async fn pull(&self, remote: &str, local: &str) -> Result<(), DeviceFault> {
        self.adb(&["pull", remote, local]).await?;
        Ok(())
    }

    async fn install_app(&self, local_apk: &str) -> Result<(), DeviceFault> {
        self.adb(&["install", "-r", local_apk]).await?;
        Ok(())
    }

    async fn uninstall_app(&self, package: &str) -> Result<(), DeviceFault> {
        self.adb(&["uninstall", package]).await?;
        Ok(())
    }

    async fn is_app_installed(&self, package: &str) -> Result<bool, DeviceFault> {
        let out = self.shell_raw(&format!("pm list packages {package}")).await?;
        Ok(out.lines().any(|line| line.trim() == format!("package:{package}")))
    }

    async fn get_prop(&self, name: &str) -> Result<String, DeviceFault> {
        self.shell_raw(&format!("getprop {name}")).await
    }

    async fn get_ip_address(&self) -> Result<Option<String>, DeviceFault> {
        let out = self.shell_raw("ip addr show wlan0").await?;
        Ok(out
            .lines()
            .find(|line| line.trim_start().starts_with("inet "))
            .and_then(|line| line.split_whitespace().nth(1))
            .map(|cidr| cidr.split('/').next().unwrap_or(cidr).to_string()))
    }

    async fn get_battery_percentage(&self) -> Result<u8, DeviceFault> {
        let out = self.shell_raw("dumpsys battery | grep level").await?;
        let value = out
            .split(':')
            .nth(1)
            .and_then(|s| s.trim().parse::<u8>().ok())
            .ok_or_else(|| DeviceFault::Transient(format!("unparseable battery output: {out}")))?;
        Ok(value)
    }

    async fn reboot(&self) -> Result<(), DeviceFault> {
        self.adb(&["reboot"]).await?;
        Ok(())
    }

    async fn power_on(&self) -> Result<(), DeviceFault> {
        self.shell_raw("input keyevent KEYCODE_POWER").await?;
        Ok(())
    }

    async fn get_logcat(&self) -> Result<String, DeviceFault> {
        self.adb(&["logcat", "-d"]).await
    }

    async fn process_exist(&self, name: &str) -> Result<bool, DeviceFault> {
        let out = self.shell_raw(&format!("pidof {name}")).await.unwrap_or_default();
        Ok(!out.trim().is_empty())
    }

    async fn pkill(&self, name: &str) -> Result<(), DeviceFault> {
        self.shell_raw(&format!("pkill -f {name}")).await?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// An in-memory [`DeviceController`] double: files are tracked in a
    /// `HashSet`, properties in a `HashMap`, and every call is recorded
    /// so tests can assert on the sequence of operations a worker issued.
    #[derive(Default)]
    pub struct FakeDeviceController {
        inner: Mutex<FakeState>,
    }

    #[derive(Default)]
    struct FakeState {
        calls: Vec<String>,
        files: std::collections::HashSet<String>,
        dirs: std::collections::HashSet<String>,
        props: HashMap<String, String>,
        installed: std::collections::HashSet<String>,
        battery_percent: u8,
        connected: bool,
        next_failure: Option<DeviceFault>,
        fail_when_contains: Option<(String, DeviceFault)>,
        logcat: String,
        running: std::collections::HashSet<String>,
        shell_outputs: HashMap<String, String>,
        ip_address: Option<String>,
    }

    impl FakeDeviceController {
        pub fn new() -> Self {
            let mut state = FakeState::default();
            state.connected = true;
            state.battery_percent = 100;
            state.ip_address = Some("10.0.0.5".to_string());
            Self { inner: Mutex::new(state) }
        }

        pub fn set_prop(&self, name: &str, value: &str) {
            self.inner.lock().props.insert(name.to_string(), value.to_string());
        }

        /// Queues a canned response for the next `shell(command)` call
        /// whose command is exactly `command`. Commands with no queued
        /// response get an empty string, matching a real device with
        /// nothing to report.
        pub fn set_shell_output(&self, command: &str, output: &str) {
            self.inner.lock().shell_outputs.insert(command.to_string(), output.to_string());
        }

        pub fn set_ip_address(&self, address: Option<&str>) {
            self.inner.lock().ip_address = address.map(str::to_string);
        }

        pub fn mark_exists(&self, path: &str) {
            self.inner.lock().files.insert(path.to_string());
        }

        pub fn set_battery_percentage(&self, value: u8) {
            self.inner.lock().battery_percent = value;
        }

        pub fn set_connected(&self, connected: bool) {
            self.inner.lock().connected = connected;
        }

        pub fn fail_next_call(&self, fault: DeviceFault) {
            self.inner.lock().next_failure = Some(fault);
        }

        /// Fails the next recorded call whose description contains
        /// `substring`, one time only. Lets a test target one specific
        /// command (e.g. a `chown ... :` attempt) without disturbing
        /// the calls around it.
        pub fn fail_when_contains(&self, substring: impl Into<String>, fault: DeviceFault) {
            self.inner.lock().fail_when_contains = Some((substring.into(), fault));
        }

        pub fn calls(&self) -> Vec<String> {
            self.inner.lock().calls.clone()
        }

        fn record(&self, call: impl Into<String>) -> Result<(), DeviceFault> {
            let mut state = self.inner.lock();
            let call = call.into();
            state.calls.push(call.clone());
            if let Some(fault) = state.next_failure.take() {
                return Err(fault);
            }
            let matches = state
                .fail_when_contains
                .as_ref()
                .is_some_and(|(substring, _)| call.contains(substring.as_str()));
            if matches {
                if let Some((_, fault)) = state.fail_when_contains.take() {
                    return Err(fault);
                }
            }
            if !state.connected {
                return Err(DeviceFault::Disconnected);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DeviceController for FakeDeviceController {
        async fn state(&self) -> Result<String, DeviceFault> {
            self.record("state")?;
            Ok("device".to_string())
        }

        async fn shell(&self, command: &str) -> Result<String, DeviceFault> {
            self.record(format!("shell {command}"))?;
            Ok(self.inner.lock().shell_outputs.get(command).cloned().unwrap_or_default())
        }

        async fn exists(&self, path: &str) -> Result<bool, DeviceFault> {
            self.record(format!("exists {path}"))?;
            let state = self.inner.lock();
            Ok(state.files.contains(path) || state.dirs.contains(path))
        }

        async fn is_dir(&self, path: &str) -> Result<bool, DeviceFault> {
            self.record(format!("is_dir {path}"))?;
            Ok(self.inner.lock().dirs.contains(path))
        }

        async fn chmod(&self, path: &str, mode: &str, recursive: bool) -> Result<(), DeviceFault> {
            self.record(format!("chmod {mode} {path} recursive={recursive}"))
        }

        async fn rm(&self, path: &str, recursive: bool, force: bool) -> Result<(), DeviceFault> {
            self.record(format!("rm {path} recursive={recursive} force={force}"))?;
            let mut state = self.inner.lock();
            state.files.remove(path);
            state.dirs.remove(path);
            Ok(())
        }

        async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), DeviceFault> {
            self.record(format!("mkdir {path} recursive={recursive}"))?;
            self.inner.lock().dirs.insert(path.to_string());
            Ok(())
        }

        async fn push(&self, local: &str, remote: &str) -> Result<(), DeviceFault> {
            self.record(format!("push {local} {remote}"))?;
            self.inner.lock().files.insert(remote.to_string());
            Ok(())
        }

        async fn pull(&self, remote: &str, _local: &str) -> Result<(), DeviceFault> {
            self.record(format!("pull {remote}"))
        }

        async fn install_app(&self, local_apk: &str) -> Result<(), DeviceFault> {
            self.record(format!("install_app {local_apk}"))?;
            self.inner.lock().installed.insert(local_apk.to_string());
            Ok(())
        }

        async fn uninstall_app(&self, package: &str) -> Result<(), DeviceFault> {
            self.record(format!("uninstall_app {package}"))?;
            self.inner.lock().installed.remove(package);
            Ok(())
        }

        async fn is_app_installed(&self, package: &str) -> Result<bool, DeviceFault> {
            self.record(format!("is_app_installed {package}"))?;
            Ok(self.inner.lock().installed.contains(package))
        }

        async fn get_prop(&self, name: &str) -> Result<String, DeviceFault> {
            self.record(format!("get_prop {name}"))?;
            Ok(self.inner.lock().props.get(name).cloned().unwrap_or_default())
        }

        async fn get_ip_address(&self) -> Result<Option<String>, DeviceFault> {
            self.record("get_ip_address")?;
            Ok(self.inner.lock().ip_address.clone())
        }

        async fn get_battery_percentage(&self) -> Result<u8, DeviceFault> {
            self.record("get_battery_percentage")?;
            Ok(self.inner.lock().battery_percent)
        }

        async fn reboot(&self) -> Result<(), DeviceFault> {
            self.record("reboot")
        }

        async fn power_on(&self) -> Result<(), DeviceFault> {
            self.record("power_on")
        }

        async fn get_logcat(&self) -> Result<String, DeviceFault> {
            self.record("get_logcat")?;
            Ok(self.inner.lock().logcat.clone())
        }

        async fn process_exist(&self, name: &str) -> Result<bool, DeviceFault> {
            self.record(format!("process_exist {name}"))?;
            Ok(self.inner.lock().running.contains(name))
        }

        async fn pkill(&self, name: &str) -> Result<(), DeviceFault> {
            self.record(format!("pkill {name}"))?;
            self.inner.lock().running.remove(name);
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
