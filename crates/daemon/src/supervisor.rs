// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor (§4.3): owns the fleet of per-device worker tasks,
//! answers Command Console queries, and turns `autophone-triggerjobs`
//! payloads into jobs via the same routing rules as the event-bus
//! consumer.
//!
//! Every `device-<verb>` reaches a worker exclusively through its
//! [`WorkerCommand`] channel — the supervisor never reaches into a
//! worker's internal state directly.
//!
//! Restart is scoped to stopping every worker and checkpointing the
//! store; re-executing the binary is left to the process supervisor
//! (systemd/launchd) that restarts `autophoned` on exit, rather than
//! this crate calling `exec` itself.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use autophone_adapters::{AdbDeviceController, BuildCacheClient, DeviceController};
use autophone_core::devices_ini::{Device, DeviceId, DevicesFile};
use autophone_core::job::BuildEvent;
use autophone_core::manifest::Manifest;
use autophone_core::{Clock, ProcessState};
use autophone_engine::{DeviceWorker, ShellTestHarness, TestHarness, WorkerCommand, WorkerSettings};
use autophone_storage::JobStore;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::bus::route_build;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("unknown device {0}")]
    UnknownDevice(String),
    #[error("request payload was not a valid build event: {0}")]
    InvalidBuildEvent(String),
}

struct WorkerHandle {
    join: tokio::task::JoinHandle<()>,
    commands: mpsc::Sender<WorkerCommand>,
}

pub type DeviceFactory = Box<dyn Fn(&Device) -> Arc<dyn DeviceController> + Send + Sync>;

/// Everything a spawned worker needs that isn't specific to the device
/// itself — grouped so `Supervisor::new`/`with_device_factory` don't
/// grow a parameter for every new worker dependency.
pub struct WorkerDeps {
    pub build_dir: PathBuf,
    pub build_cache: Arc<dyn BuildCacheClient>,
    pub harness: Arc<dyn TestHarness>,
    pub settings: WorkerSettings,
}

impl WorkerDeps {
    pub fn new(build_dir: PathBuf, build_cache: Arc<dyn BuildCacheClient>, settings: WorkerSettings) -> Self {
        Self {
            build_dir,
            build_cache,
            harness: Arc::new(ShellTestHarness),
            settings,
        }
    }
}

pub struct Supervisor<C: Clock> {
    store: Arc<Mutex<JobStore>>,
    devices: DevicesFile,
    manifest: Manifest,
    workers: HashMap<DeviceId, WorkerHandle>,
    clock: C,
    upload_dir: PathBuf,
    state: ProcessState,
    device_factory: DeviceFactory,
    deps: WorkerDeps,
}

impl<C: Clock + 'static> Supervisor<C> {
    pub fn new(store: Arc<Mutex<JobStore>>, devices: DevicesFile, manifest: Manifest, clock: C, upload_dir: PathBuf, deps: WorkerDeps) -> Self {
        Self::with_device_factory(
            store,
            devices,
            manifest,
            clock,
            upload_dir,
            deps,
            Box::new(|device| Arc::new(AdbDeviceController::new(device.serial.clone()))),
        )
    }

    /// As [`Supervisor::new`], but with the device controller construction
    /// swapped out — used by tests to spawn workers against
    /// `FakeDeviceController` instead of shelling out to real `adb`.
    pub fn with_device_factory(
        store: Arc<Mutex<JobStore>>,
        devices: DevicesFile,
        manifest: Manifest,
        clock: C,
        upload_dir: PathBuf,
        deps: WorkerDeps,
        device_factory: DeviceFactory,
    ) -> Self {
        Self {
            store,
            devices,
            manifest,
            workers: HashMap::new(),
            clock,
            upload_dir,
            state: ProcessState::Starting,
            device_factory,
            deps,
        }
    }

    /// Spawns a worker task for every device currently in `devices.ini`.
    pub fn start_all(&mut self) {
        self.state = ProcessState::Running;
        let devices: Vec<Device> = self.devices.iter().map(|(_, d)| d.clone()).collect();
        for device in devices {
            self.spawn_worker(&device);
        }
    }

    fn spawn_worker(&mut self, device: &Device) {
        let controller = (self.device_factory)(device);
        let (mut worker, commands) = DeviceWorker::new(
            device.id,
            controller,
            self.store.clone(),
            self.clock.clone(),
            self.upload_dir.clone(),
            self.deps.build_dir.clone(),
            self.deps.build_cache.clone(),
            self.deps.harness.clone(),
            self.deps.settings.clone(),
        );
        let device_id = device.id;
        let join = tokio::spawn(async move {
            worker.run().await;
        });
        self.workers.insert(device_id, WorkerHandle { join, commands });
    }

    /// Registers a hot-plugged device by serial and starts its worker
    /// (`autophone-add-device`, §6). Not read back from `devices.ini`:
    /// an operator adding a device live doesn't require a config file
    /// edit first.
    pub fn add_device(&mut self, serial: &str) -> DeviceId {
        let device = Device {
            id: DeviceId::new(),
            name: serial.to_string(),
            serial: serial.to_string(),
            hardware: None,
            os_version: None,
            abi: None,
            sdk_bucket: None,
            host_ip: None,
            test_root: None,
        };
        let id = device.id;
        self.spawn_worker(&device);
        id
    }

    /// Applies `autophone-triggerjobs`'s payload through the same
    /// matching rules the pulse consumer uses.
    pub fn trigger_jobs(&mut self, payload: serde_json::Value) -> Result<(), SupervisorError> {
        let build: BuildEvent = serde_json::from_value(payload).map_err(|e| SupervisorError::InvalidBuildEvent(e.to_string()))?;
        let mut store = self.store.lock();
        route_build(&mut store, &self.devices, &self.manifest, &build, self.clock.epoch_ms());
        Ok(())
    }

    /// A snapshot of fleet and queue state for `autophone-status`.
    pub fn status(&self) -> serde_json::Value {
        let store = self.store.lock();
        let devices: Vec<_> = self
            .workers
            .keys()
            .map(|id| {
                let pending = store.state().next_job_for_device(id).is_some();
                serde_json::json!({ "device_id": id.to_string(), "pending_job": pending, "alive": self.is_alive(Some(id)).unwrap_or(false) })
            })
            .collect();
        serde_json::json!({
            "state": self.state.to_string(),
            "devices": devices,
            "pending_submissions": store.state().pending_submissions.len(),
        })
    }

    /// Per-device status for the `device-status` console verb (§6).
    pub fn device_status(&self, device_id: &DeviceId) -> Result<serde_json::Value, SupervisorError> {
        if !self.workers.contains_key(device_id) {
            return Err(SupervisorError::UnknownDevice(device_id.to_string()));
        }
        let store = self.store.lock();
        let pending = store.state().next_job_for_device(device_id).is_some();
        Ok(serde_json::json!({
            "device_id": device_id.to_string(),
            "pending_job": pending,
            "alive": self.is_alive(Some(device_id)).unwrap_or(false),
        }))
    }

    /// Whether the named device's worker task is still running, or
    /// whether every worker is when `device_id` is `None` (§6).
    pub fn is_alive(&self, device_id: Option<&DeviceId>) -> Result<bool, SupervisorError> {
        match device_id {
            Some(id) => {
                let handle = self.workers.get(id).ok_or_else(|| SupervisorError::UnknownDevice(id.to_string()))?;
                Ok(!handle.join.is_finished())
            }
            None => Ok(self.workers.values().all(|handle| !handle.join.is_finished())),
        }
    }

    /// Routes a `device-<verb>` command to the named worker, or to
    /// every worker for `device-all`. The channel send is best-effort:
    /// a full or closed channel is logged and dropped rather than
    /// blocking the console connection (§6, §7).
    fn dispatch_command(&self, device_id: Option<&DeviceId>, cmd: WorkerCommand) -> Result<(), SupervisorError> {
        match device_id {
            Some(id) => {
                let handle = self.workers.get(id).ok_or_else(|| SupervisorError::UnknownDevice(id.to_string()))?;
                if handle.commands.try_send(cmd).is_err() {
                    tracing::warn!(device_id = %id, "worker command channel full or closed, dropping command");
                }
                Ok(())
            }
            None => {
                for (id, handle) in &self.workers {
                    if handle.commands.try_send(cmd).is_err() {
                        tracing::warn!(device_id = %id, "worker command channel full or closed, dropping command");
                    }
                }
                Ok(())
            }
        }
    }

    pub fn stop_device(&self, device_id: Option<&DeviceId>) -> Result<(), SupervisorError> {
        self.dispatch_command(device_id, WorkerCommand::Shutdown)
    }

    pub fn disable_device(&self, device_id: Option<&DeviceId>) -> Result<(), SupervisorError> {
        self.dispatch_command(device_id, WorkerCommand::Disable)
    }

    pub fn enable_device(&self, device_id: Option<&DeviceId>) -> Result<(), SupervisorError> {
        self.dispatch_command(device_id, WorkerCommand::Enable)
    }

    pub fn reboot_device(&self, device_id: Option<&DeviceId>) -> Result<(), SupervisorError> {
        self.dispatch_command(device_id, WorkerCommand::Reboot)
    }

    pub fn ping_device(&self, device_id: Option<&DeviceId>) -> Result<(), SupervisorError> {
        self.dispatch_command(device_id, WorkerCommand::Ping)
    }

    /// Reboots then re-enables the worker, for a device stuck in a bad
    /// state without tearing its task down entirely (§6).
    pub fn restart_device(&self, device_id: Option<&DeviceId>) -> Result<(), SupervisorError> {
        self.dispatch_command(device_id, WorkerCommand::Reboot)?;
        self.dispatch_command(device_id, WorkerCommand::Enable)
    }

    /// Signals every worker to finish its in-flight job and stop, then
    /// waits for them to exit.
    pub async fn shutdown(&mut self) {
        self.state = ProcessState::Shuttingdown;
        for handle in self.workers.values() {
            let _ = handle.commands.try_send(WorkerCommand::Shutdown);
        }
        for (_, handle) in self.workers.drain() {
            let _ = handle.join.await;
        }
        self.state = ProcessState::Shutdown;
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
