// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Command Console listener (§6): accepts TCP connections, reads
//! one [`autophone_wire::Request`] per connection, and dispatches it
//! against the shared [`Supervisor`]. Each connection is handled in its
//! own task so a slow or stalled client can't block the fleet.

mod console;

use std::sync::Arc;

use autophone_core::Clock;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::supervisor::Supervisor;

/// Shared state every connection handler dispatches against. The
/// supervisor is held by `Arc` rather than owned outright so `main`
/// keeps its own handle to drive shutdown after the listener stops
/// accepting connections.
pub struct ListenerCtx<C: Clock> {
    pub supervisor: Arc<Mutex<Supervisor<C>>>,
    /// Notified once when a connection handles `autophone-shutdown` or
    /// `autophone-stop`, so `main` can drive the rest of teardown. Shared
    /// with `main`'s own copy rather than owned, so both sides observe
    /// the same notification.
    pub shutdown: Arc<Notify>,
}

pub struct Listener<C: Clock> {
    tcp: TcpListener,
    ctx: Arc<ListenerCtx<C>>,
}

impl<C: Clock + 'static> Listener<C> {
    pub fn new(tcp: TcpListener, ctx: Arc<ListenerCtx<C>>) -> Self {
        Self { tcp, ctx }
    }

    /// Accepts connections until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                accepted = self.tcp.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            tracing::debug!(%addr, "console connection accepted");
                            let ctx = self.ctx.clone();
                            tokio::spawn(async move {
                                if let Err(err) = console::handle_connection(stream, &ctx).await {
                                    tracing::warn!(error = %err, "console connection error");
                                }
                            });
                        }
                        Err(err) => tracing::warn!(error = %err, "console accept error"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
