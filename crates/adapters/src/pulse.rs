// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event-bus consumer (§4.4): a websocket stream of build
//! notifications that the daemon filters by platform and try-opt-in
//! before turning a message into a `JobEnqueued` event.

use async_trait::async_trait;
use autophone_core::job::BuildEvent;
use futures_util::StreamExt;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Error)]
pub enum PulseError {
    #[error("pulse connection error: {0}")]
    Connect(String),
    #[error("pulse message was not a valid build event: {0}")]
    Decode(String),
    #[error("pulse stream closed")]
    Closed,
}

#[async_trait]
pub trait EventBusClient: Send + Sync {
    /// Blocks until the next build event arrives, or the stream ends.
    async fn next_build_event(&mut self) -> Result<BuildEvent, PulseError>;
}

pub struct WsEventBusClient {
    stream: tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
}

impl WsEventBusClient {
    pub async fn connect(url: &str) -> Result<Self, PulseError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| PulseError::Connect(e.to_string()))?;
        Ok(Self { stream })
    }
}

#[async_trait]
impl EventBusClient for WsEventBusClient {
    async fn next_build_event(&mut self) -> Result<BuildEvent, PulseError> {
        loop {
            let message = self.stream.next().await.ok_or(PulseError::Closed)?.map_err(|e| PulseError::Connect(e.to_string()))?;
            match message {
                Message::Text(text) => {
                    return serde_json::from_str(text.as_str()).map_err(|e| PulseError::Decode(e.to_string()));
                }
                Message::Binary(bytes) => {
                    return serde_json::from_slice(&bytes).map_err(|e| PulseError::Decode(e.to_string()));
                }
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => return Err(PulseError::Closed),
                Message::Frame(_) => continue,
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::collections::VecDeque;

    pub struct FakeEventBusClient {
        pending: VecDeque<BuildEvent>,
    }

    impl FakeEventBusClient {
        pub fn new(events: Vec<BuildEvent>) -> Self {
            Self {
                pending: events.into(),
            }
        }
    }

    #[async_trait]
    impl EventBusClient for FakeEventBusClient {
        async fn next_build_event(&mut self) -> Result<BuildEvent, PulseError> {
            self.pending.pop_front().ok_or(PulseError::Closed)
        }
    }
}

#[cfg(test)]
#[path = "pulse_tests.rs"]
mod tests;
