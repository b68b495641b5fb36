// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `autophoned`: the fleet controller daemon (§1, §6). Brings up the
//! job store, the per-device worker fleet, the pulse event-bus
//! consumer, the results submitter, and the Command Console listener,
//! then runs until an operator (or SIGTERM) asks it to stop.

mod bus;
mod lifecycle;
mod listener;
mod logging;
mod results_submitter;
mod supervisor;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use autophone_adapters::{HttpBuildCacheClient, HttpResultsServiceClient, WsEventBusClient};
use autophone_core::{Clock, Config, SystemClock};
use autophone_engine::WorkerSettings;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::bus::EventBusConsumer;
use crate::listener::{Listener, ListenerCtx};
use crate::results_submitter::ResultsSubmitter;
use crate::supervisor::{Supervisor, WorkerDeps};

#[tokio::main]
async fn main() {
    let config = load_config();

    let started = match lifecycle::startup(&config) {
        Ok(started) => started,
        Err(err) => {
            eprintln!("autophoned: startup failed: {err}");
            std::process::exit(1);
        }
    };

    let log_dir = config.logfile.parent().map(PathBuf::from).unwrap_or_else(|| config.cache_dir.clone());
    let _log_guard = logging::init(&log_dir, "autophone", &config.loglevel);
    logging::sweep_old_logs(&log_dir, "autophone");
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "autophoned starting");

    let store = Arc::new(Mutex::new(started.store));
    let pulse_devices = started.devices.clone();
    let pulse_manifest = started.manifest.clone();

    let worker_settings = WorkerSettings {
        phone_retry_limit: config.phone_retry_limit,
        phone_retry_wait: config.phone_retry_wait(),
        battery_min: config.battery_min,
        battery_max: config.battery_max,
        device_test_root: config.device_test_root.clone(),
    };
    let worker_deps = WorkerDeps::new(config.cache_dir.join("builds"), Arc::new(HttpBuildCacheClient), worker_settings);
    let mut supervisor = Supervisor::new(store.clone(), started.devices, started.manifest, SystemClock, config.cache_dir.join("uploads"), worker_deps);
    supervisor.start_all();
    let supervisor = Arc::new(Mutex::new(supervisor));

    let shutdown = Arc::new(Notify::new());
    let cancel = CancellationToken::new();

    let tcp = match TcpListener::bind(("127.0.0.1", config.console_port)).await {
        Ok(tcp) => tcp,
        Err(err) => {
            tracing::error!(port = config.console_port, error = %err, "failed to bind the command console port");
            std::process::exit(1);
        }
    };
    let ctx = Arc::new(ListenerCtx { supervisor: supervisor.clone(), shutdown: shutdown.clone() });
    let console = tokio::spawn(Listener::new(tcp, ctx).run(cancel.clone()));

    let submitter = started_submitter(&config, store.clone());
    let submitter_shutdown = submitter.as_ref().map(ResultsSubmitter::shutdown_handle);
    let submitter_task = submitter.map(|submitter| tokio::spawn(async move { submitter.run(|| SystemClock.epoch_ms()).await }));

    let pulse_task = if config.enable_pulse { Some(spawn_pulse_consumer(store.clone(), pulse_devices, pulse_manifest)) } else { None };

    tokio::select! {
        _ = shutdown.notified() => tracing::info!("shutdown requested over the command console"),
        _ = tokio::signal::ctrl_c() => tracing::info!("received ctrl-c, shutting down"),
    }

    cancel.cancel();
    if let Some(handle) = submitter_shutdown {
        handle.store(true, Ordering::Relaxed);
    }
    if let Some(task) = pulse_task {
        task.abort();
    }
    if let Some(task) = submitter_task {
        let _ = task.await;
    }
    let _ = console.await;

    // The listener's ctx clone is dropped with the task above, so this is
    // the last reference and `shutdown` never has to wait behind a lock
    // someone else is holding across an await.
    let mut supervisor = Arc::try_unwrap(supervisor).unwrap_or_else(|_| panic!("supervisor still shared after listener shutdown")).into_inner();
    supervisor.shutdown().await;

    lifecycle::shutdown(&mut store.lock(), &config.cache_dir, SystemClock.epoch_ms());
    drop(started.lock);
    tracing::info!("autophoned stopped");
}

fn load_config() -> Config {
    let env: HashMap<String, String> = std::env::vars().collect();
    let config_path = env.get("AUTOPHONE_CONFIG").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("autophone.ini"));
    let contents = std::fs::read_to_string(&config_path).ok();
    match Config::load(contents.as_deref(), &env) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("autophoned: invalid configuration: {err}");
            std::process::exit(1);
        }
    }
}

/// `None` when Treeherder credentials are not configured — the
/// submitter is then simply not started, leaving submissions queued
/// for the next run that does have credentials.
fn started_submitter(config: &Config, store: Arc<Mutex<autophone_storage::JobStore>>) -> Option<ResultsSubmitter> {
    let url = config.treeherder.url.clone()?;
    let client_id = config.treeherder.client_id.clone()?;
    let secret = config.treeherder.secret.clone()?;
    let client = Arc::new(HttpResultsServiceClient::new(client_id, secret));
    let retry_wait = Duration::from_secs(config.treeherder.retry_wait_secs.max(1));
    Some(ResultsSubmitter::new(store, client, url, retry_wait))
}

fn spawn_pulse_consumer(
    store: Arc<Mutex<autophone_storage::JobStore>>,
    devices: autophone_core::devices_ini::DevicesFile,
    manifest: autophone_core::manifest::Manifest,
) -> tokio::task::JoinHandle<()> {
    let url = std::env::var("AUTOPHONE_PULSE_URL").unwrap_or_else(|_| "wss://pulse.example.test".to_string());
    tokio::spawn(async move {
        match WsEventBusClient::connect(&url).await {
            Ok(client) => {
                let mut consumer = EventBusConsumer::new(Box::new(client), store, devices, manifest);
                consumer.run(|| SystemClock.epoch_ms()).await;
            }
            Err(err) => tracing::error!(error = %err, "pulse connection failed, disabling event-bus consumer"),
        }
    })
}
