// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy (§7). Each fault type has a distinct propagation policy;
//! see the variant docs for where it is allowed to surface.

use thiserror::Error;

/// Faults originating from the device controller. Never escapes the
/// worker process (§7).
#[derive(Debug, Error)]
pub enum DeviceFault {
    /// Timeout or shell error; recovered by retry and, if exhausted, a
    /// device reboot. On exhaustion the device transitions to ERROR.
    #[error("transient device fault: {0}")]
    Transient(String),
    /// Device controller reports the device is not present. Only
    /// recoverable by host reboot (if configured) or operator action.
    #[error("device disconnected")]
    Disconnected,
    /// Crash budget exceeded; the device transitions to DISABLED and is
    /// not restarted.
    #[error("crash budget exceeded ({count} crashes in {window_secs}s)")]
    Permanent { count: u32, window_secs: u64 },
}

/// A test step raised. Never escapes the worker's per-job procedure; the
/// test's result becomes EXCEPTION and the job continues (§7).
#[derive(Debug, Error)]
#[error("test step failed: {0}")]
pub struct JobFault(pub String);

/// Operator command or shutdown interrupted an in-flight test. Never
/// escapes the worker's main loop; attempts are restored via
/// `set_attempts(job, attempts - 1)` (§7).
#[derive(Debug, Error)]
pub enum InterruptFault {
    #[error("shutdown requested")]
    Shutdown,
    #[error("test {0} cancelled by operator")]
    Cancelled(String),
}

/// Transient persistence error. Retried with a fixed delay; after a
/// threshold, one mail notification per call, then blocks until it
/// succeeds (§7).
#[derive(Debug, Error)]
#[error("storage fault: {0}")]
pub struct StorageFault(pub String);

/// POST to the results service failed. Bounded retry inside the
/// submitter; never dropped, never escapes the submitter loop (§7).
#[derive(Debug, Error)]
#[error("submission fault: {0}")]
pub struct SubmissionFault(pub String);

/// Inconsistent startup configuration. Fatal at startup, before any
/// listener binds (§7).
#[derive(Debug, Error)]
pub enum ConfigFault {
    #[error("{field} must be set together with {siblings:?}, or not at all")]
    PartialCredentials { field: &'static str, siblings: &'static [&'static str] },
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed config file: {0}")]
    Parse(String),
}
