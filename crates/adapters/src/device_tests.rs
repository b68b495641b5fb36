// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::fake::FakeDeviceController;
use super::DeviceController;
use autophone_core::DeviceFault;

#[tokio::test]
async fn push_then_exists_reports_the_pushed_file() {
    let device = FakeDeviceController::new();
    device.push("local.apk", "/sdcard/local.apk").await.unwrap();
    assert!(device.exists("/sdcard/local.apk").await.unwrap());
    assert!(!device.exists("/sdcard/other.apk").await.unwrap());
}

#[tokio::test]
async fn install_then_uninstall_tracks_installed_state() {
    let device = FakeDeviceController::new();
    device.install_app("/data/local/tmp/fennec.apk").await.unwrap();
    assert!(device.is_app_installed("/data/local/tmp/fennec.apk").await.unwrap());
    device.uninstall_app("/data/local/tmp/fennec.apk").await.unwrap();
    assert!(!device.is_app_installed("/data/local/tmp/fennec.apk").await.unwrap());
}

#[tokio::test]
async fn disconnected_device_fails_every_call() {
    let device = FakeDeviceController::new();
    device.set_connected(false);
    let err = device.get_battery_percentage().await.unwrap_err();
    assert!(matches!(err, DeviceFault::Disconnected));
}

#[tokio::test]
async fn fail_next_call_injects_a_single_fault() {
    let device = FakeDeviceController::new();
    device.fail_next_call(DeviceFault::Transient("boom".into()));
    assert!(device.reboot().await.is_err());
    assert!(device.reboot().await.is_ok());
}

#[tokio::test]
async fn calls_are_recorded_in_order() {
    let device = FakeDeviceController::new();
    device.mkdir("/sdcard/tests", true).await.unwrap();
    device.push("a", "/sdcard/tests/a").await.unwrap();
    assert_eq!(
        device.calls(),
        vec!["mkdir /sdcard/tests recursive=true", "push a /sdcard/tests/a"]
    );
}
