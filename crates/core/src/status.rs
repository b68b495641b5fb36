// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phone and process status enums reported on the worker status channel and
//! surfaced by `autophone-status` / `device-status`.

use serde::{Deserialize, Serialize};

/// Device-facing health/activity status of a worker's phone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhoneStatus {
    Idle,
    Fetching,
    Installing,
    Charging,
    Working,
    Disconnected,
    Error,
    Disabled,
    Rebooting,
    Shutdown,
}

crate::simple_display! {
    PhoneStatus {
        Idle => "IDLE",
        Fetching => "FETCHING",
        Installing => "INSTALLING",
        Charging => "CHARGING",
        Working => "WORKING",
        Disconnected => "DISCONNECTED",
        Error => "ERROR",
        Disabled => "DISABLED",
        Rebooting => "REBOOTING",
        Shutdown => "SHUTDOWN",
    }
}

impl PhoneStatus {
    /// Heartbeat staleness is excused while a worker is downloading a build
    /// (§5 "maximum_heartbeat ... excluding FETCHING").
    pub fn excused_from_heartbeat_check(self) -> bool {
        matches!(self, PhoneStatus::Fetching)
    }
}

/// Lifecycle state of the supervisor or of a single device worker task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    Starting,
    Running,
    Restarting,
    Shuttingdown,
    Shutdown,
    Stopping,
}

crate::simple_display! {
    ProcessState {
        Starting => "STARTING",
        Running => "RUNNING",
        Restarting => "RESTARTING",
        Shuttingdown => "SHUTTINGDOWN",
        Shutdown => "SHUTDOWN",
        Stopping => "STOPPING",
    }
}
