// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Installing a build onto a device (§3, §4.2): uninstall every
//! `org.mozilla.(fennec|firefox)` package plus the Flash package if
//! present, reboot, then install the new APK. Each half of the
//! sequence is retried up to `phone_retry_limit` times with
//! `phone_retry_wait` between attempts, probing the device's
//! connection state between failures so a transient disconnect gets a
//! chance to clear before the next attempt.

use std::time::Duration;

use autophone_adapters::DeviceController;
use autophone_core::DeviceFault;

pub const FENNEC_PACKAGE: &str = "org.mozilla.fennec";
pub const FLASH_PACKAGE: &str = "com.adobe.flashplayer";

/// Installs `local_apk` after clearing out every prior Fennec/Firefox
/// install and the Flash package, rebooting in between so the
/// uninstalls actually take. A prior uninstall that fails with
/// `Failure` (§9 open question) is treated as "already uninstalled",
/// not as an error, so a fresh device with nothing installed yet
/// doesn't block every job.
pub async fn install_build(
    device: &dyn DeviceController,
    local_apk: &str,
    retry_limit: u32,
    retry_wait: Duration,
) -> Result<(), DeviceFault> {
    with_retries(device, retry_limit, retry_wait, "uninstall", || uninstall_mozilla_family(device)).await?;
    device.reboot().await?;
    with_retries(device, retry_limit, retry_wait, "install", || install_once(device, local_apk)).await
}

/// Retries `step` up to `retry_limit` times, probing the device's
/// connection state between attempts so a transient drop gets a
/// chance to surface as a distinguishable fault on the next try.
async fn with_retries<F, Fut>(device: &dyn DeviceController, retry_limit: u32, retry_wait: Duration, label: &str, mut step: F) -> Result<(), DeviceFault>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), DeviceFault>>,
{
    let mut last_err = None;
    for attempt in 1..=retry_limit.max(1) {
        match step().await {
            Ok(()) => return Ok(()),
            Err(fault) => {
                tracing::warn!(attempt, label, error = %fault, "install step failed, retrying");
                last_err = Some(fault);
                let _ = device.state().await;
                tokio::time::sleep(retry_wait).await;
            }
        }
    }
    Err(last_err.unwrap_or(DeviceFault::Disconnected))
}

async fn uninstall_mozilla_family(device: &dyn DeviceController) -> Result<(), DeviceFault> {
    let packages = device.shell("pm list package org.mozilla").await?;
    for line in packages.lines() {
        let package = line.trim().trim_start_matches("package:");
        if package.contains("fennec") || package.contains("firefox") {
            uninstall_package(device, package).await?;
        }
    }
    if device.is_app_installed(FLASH_PACKAGE).await? {
        uninstall_package(device, FLASH_PACKAGE).await?;
    }
    Ok(())
}

async fn install_once(device: &dyn DeviceController, local_apk: &str) -> Result<(), DeviceFault> {
    device.install_app(local_apk).await?;
    if !device.is_app_installed(FENNEC_PACKAGE).await? {
        return Err(DeviceFault::Transient("install reported success but package is absent".to_string()));
    }
    Ok(())
}

/// Uninstalls `package`, mapping a bare `Failure` ADBError to success
/// (§9 open question): the only way `adb uninstall` reports that exact
/// message is when the package was never installed to begin with.
async fn uninstall_package(device: &dyn DeviceController, package: &str) -> Result<(), DeviceFault> {
    match device.uninstall_app(package).await {
        Ok(()) => Ok(()),
        Err(DeviceFault::Transient(msg)) if msg.trim() == "Failure" => Ok(()),
        Err(other) => Err(other),
    }
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;
