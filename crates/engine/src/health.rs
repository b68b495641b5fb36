// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The device worker's health probe (§4.2, §5): confirms a device is
//! reachable, SELinux-permissive, and that `/data/local/tmp` and the
//! configured device test-root are writable, retrying up to
//! `phone_retry_limit` times with `phone_retry_wait` between attempts.
//! A missing IP address triggers a wpa_supplicant recovery if a backup
//! configuration is staged on the device.

use std::path::{Path, PathBuf};
use std::time::Duration;

use autophone_adapters::DeviceController;
use autophone_core::DeviceFault;

const FIXED_PROBE_PATH: &str = "/data/local/tmp";
const BACKUP_WPA_SUPPLICANT_SOURCE: &str = "/data/local/tmp/wpa_supplicant.conf";
const WPA_SUPPLICANT_CONF: &str = "/data/misc/wifi/wpa_supplicant.conf";
const ANR_TRACES_SOURCE: &str = "/data/anr/traces.txt";

/// Iterates up to `retry_limit` times, returning as soon as one
/// iteration is fully healthy.
pub async fn ping(device: &dyn DeviceController, retry_limit: u32, retry_wait: Duration, device_test_root: &str) -> Result<(), DeviceFault> {
    let mut last_err = None;
    for attempt in 1..=retry_limit.max(1) {
        match ping_once(device, device_test_root).await {
            Ok(()) => return Ok(()),
            Err(fault) => {
                tracing::warn!(attempt, error = %fault, "ping attempt failed");
                last_err = Some(fault);
                tokio::time::sleep(retry_wait).await;
            }
        }
    }
    Err(last_err.unwrap_or(DeviceFault::Disconnected))
}

/// A passing iteration means the device answers `adb`, SELinux is
/// permissive, its fixed and test-root paths are writable, and it has
/// an IP address (recovering wifi first if a backup config is staged).
async fn ping_once(device: &dyn DeviceController, device_test_root: &str) -> Result<(), DeviceFault> {
    let state = device.state().await?;
    if state != "device" {
        return Err(DeviceFault::Transient(format!("adb reports state {state:?}")));
    }

    let enforce = device.shell("getenforce").await.unwrap_or_default();
    if enforce.trim() != "Permissive" {
        device.shell("setenforce Permissive").await?;
    }

    check_path_writable(device, FIXED_PROBE_PATH).await?;
    check_path_writable(device, device_test_root).await?;

    match device.get_ip_address().await {
        Ok(Some(_)) => Ok(()),
        _ => {
            if device.exists(BACKUP_WPA_SUPPLICANT_SOURCE).await.unwrap_or(false) {
                recover_wifi(device).await?;
            }
            Err(DeviceFault::Transient("device network offline".to_string()))
        }
    }
}

async fn check_path_writable(device: &dyn DeviceController, path: &str) -> Result<(), DeviceFault> {
    let probe = format!("{}/autophone-probe", path.trim_end_matches('/'));
    device.mkdir(&probe, true).await?;
    if !device.is_dir(&probe).await? {
        return Err(DeviceFault::Transient(format!("{path} is not writable")));
    }
    device.rm(&probe, true, true).await?;
    Ok(())
}

/// Disables wifi, overwrites the live wpa_supplicant config from the
/// on-device backup, and re-enables wifi. The `chown` syntax is
/// attempted `user.group` first, falling back to `user:group` for
/// devices whose `chown` rejects the dotted form (§4.2, §9).
pub async fn recover_wifi(device: &dyn DeviceController) -> Result<(), DeviceFault> {
    device.shell("svc wifi disable").await?;
    device.shell(&format!("dd if={BACKUP_WPA_SUPPLICANT_SOURCE} of={WPA_SUPPLICANT_CONF}")).await?;
    if device.shell(&format!("chown wifi.wifi {WPA_SUPPLICANT_CONF}")).await.is_err() {
        device.shell(&format!("chown wifi:wifi {WPA_SUPPLICANT_CONF}")).await?;
    }
    device.shell("svc wifi enable").await?;
    Ok(())
}

/// Pulls ANR traces into `<upload_dir>/traces.txt`. The destination
/// filename is fixed regardless of which process triggered the ANR
/// (open question resolution: always write to `traces.txt`, never a
/// per-process name).
pub async fn collect_anr_traces(device: &dyn DeviceController, upload_dir: &Path) -> Result<PathBuf, DeviceFault> {
    let destination = upload_dir.join("traces.txt");
    let destination_str = destination.to_string_lossy().to_string();
    device.pull(ANR_TRACES_SOURCE, &destination_str).await?;
    Ok(destination)
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
