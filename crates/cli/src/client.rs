// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single request/response round trip against the Command Console.

use autophone_core::ConfigError;
use autophone_wire::{read_response, write_request, Request, Response, WireError};
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::TcpStream;

pub struct ConsoleTarget {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("could not connect to {host}:{port}: {source}")]
    Connect { host: String, port: u16, source: std::io::Error },
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("invalid daemon configuration: {0}")]
    Config(#[from] ConfigError),
}

pub async fn send(target: &ConsoleTarget, request: &Request) -> Result<Response, ConsoleError> {
    let stream = TcpStream::connect((target.host.as_str(), target.port))
        .await
        .map_err(|source| ConsoleError::Connect { host: target.host.clone(), port: target.port, source })?;
    let (read_half, mut write_half) = stream.into_split();
    write_request(&mut write_half, request).await?;
    let mut reader = BufReader::new(read_half);
    Ok(read_response(&mut reader).await?)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
