// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use autophone_adapters::{FakeBuildCacheClient, FakeDeviceController};
use autophone_core::devices_ini::DevicesFile;
use autophone_core::manifest::Manifest;
use autophone_core::FakeClock;
use autophone_engine::{FakeTestHarness, WorkerSettings};
use autophone_storage::JobStore;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::supervisor::WorkerDeps;

use super::*;

async fn spawn_listener() -> (std::net::SocketAddr, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Mutex::new(JobStore::open_for_test(dir.path().join("jobs.wal"), dir.path().join("jobs.snapshot")).unwrap()));
    let deps = WorkerDeps {
        build_dir: dir.path().join("builds"),
        build_cache: Arc::new(FakeBuildCacheClient::new()),
        harness: Arc::new(FakeTestHarness::new()),
        settings: WorkerSettings::default(),
    };
    let supervisor = Supervisor::with_device_factory(
        store,
        DevicesFile::parse("").unwrap(),
        Manifest::parse(""),
        FakeClock::new(),
        dir.path().join("uploads"),
        deps,
        Box::new(|_device| Arc::new(FakeDeviceController::new())),
    );
    let ctx = Arc::new(ListenerCtx { supervisor: Arc::new(Mutex::new(supervisor)), shutdown: Arc::new(Notify::new()) });
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::new(tcp, ctx);
    let cancel = CancellationToken::new();
    tokio::spawn(listener.run(cancel));
    (addr, dir)
}

async fn roundtrip(addr: std::net::SocketAddr, line: &str) -> String {
    let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    write_half.write_all(format!("{line}\n").as_bytes()).await.unwrap();
    let mut reader = BufReader::new(read_half);
    let mut response = String::new();
    reader.read_line(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn status_request_returns_an_ok_with_a_json_body() {
    let (addr, _dir) = spawn_listener().await;
    let response = roundtrip(addr, "autophone-status").await;
    assert!(response.starts_with("OK "), "unexpected response: {response}");
}

#[tokio::test]
async fn add_device_spawns_a_worker_and_returns_its_id() {
    let (addr, _dir) = spawn_listener().await;
    let response = roundtrip(addr, "autophone-add-device HOTPLUG001").await;
    assert!(response.starts_with("OK "), "unexpected response: {response}");
}

#[tokio::test]
async fn an_unparsable_request_line_gets_dropped_without_crashing_the_listener() {
    let (addr, _dir) = spawn_listener().await;
    let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let (_read_half, mut write_half) = stream.into_split();
    write_half.write_all(b"not-a-real-verb\n").await.unwrap();
    drop(write_half);

    // the listener must still be alive for a follow-up connection
    let response = roundtrip(addr, "autophone-status").await;
    assert!(response.starts_with("OK "));
}
