// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! autophone-adapters: every boundary the fleet controller crosses to
//! touch the outside world — a device over `adb` (§4.7), the results
//! service (§4.5), the event bus (§4.4), and the out-of-scope external
//! collaborators named in §2.

pub mod device;
pub mod external;
pub mod pulse;
pub mod results;

pub use device::{AdbDeviceController, DeviceController};
pub use external::{content_key, BuildCacheClient, HttpBuildCacheClient, MailClient, ObjectStoreClient};
pub use pulse::{EventBusClient, PulseError, WsEventBusClient};
pub use results::{HttpResultsServiceClient, ResultsServiceClient};

#[cfg(any(test, feature = "test-support"))]
pub use device::fake::FakeDeviceController;
#[cfg(any(test, feature = "test-support"))]
pub use external::fake::{FakeBuildCacheClient, FakeMailClient, FakeObjectStoreClient};
#[cfg(any(test, feature = "test-support"))]
pub use pulse::fake::FakeEventBusClient;
#[cfg(any(test, feature = "test-support"))]
pub use results::fake::FakeResultsServiceClient;
