// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::fake::FakeEventBusClient;
use super::{EventBusClient, PulseError};
use autophone_core::test_support::fixture_build_event;

#[tokio::test]
async fn fake_client_yields_events_in_order_then_closes() {
    let mut client = FakeEventBusClient::new(vec![
        fixture_build_event("mozilla-central", "android-api-15", ""),
        fixture_build_event("try", "android-api-15", "try: -u autophone-smoke"),
    ]);

    let first = client.next_build_event().await.unwrap();
    assert_eq!(first.repo, "mozilla-central");

    let second = client.next_build_event().await.unwrap();
    assert!(second.is_try());

    assert!(matches!(client.next_build_event().await, Err(PulseError::Closed)));
}
