// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-based read/write helpers for a Command Console connection, with
//! a bounded wait on each side so one stalled client can't pin down a
//! connection-handling task forever.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::request::{Request, RequestError};
use crate::response::{Response, ResponseError};

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum WireError {
    #[error("connection closed before a request line was read")]
    Closed,
    #[error("timed out waiting for a request line")]
    ReadTimeout,
    #[error("timed out writing the response")]
    WriteTimeout,
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Response(#[from] ResponseError),
    #[error("connection io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads one line from `reader`, parses it as a [`Request`], and
/// returns it. `reader` must already be buffered (or be wrapped here).
pub async fn read_request<R>(reader: &mut BufReader<R>) -> Result<Request, WireError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    let read = tokio::time::timeout(DEFAULT_READ_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| WireError::ReadTimeout)??;
    if read == 0 {
        return Err(WireError::Closed);
    }
    Ok(Request::parse(&line)?)
}

pub async fn write_response<W>(writer: &mut W, response: &Response) -> Result<(), WireError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let bytes = response.to_wire_string();
    tokio::time::timeout(DEFAULT_WRITE_TIMEOUT, async {
        writer.write_all(bytes.as_bytes()).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| WireError::WriteTimeout)??;
    Ok(())
}

/// Writes one request line. Used by the CLI client; the mirror image
/// of [`write_response`] on the daemon side.
pub async fn write_request<W>(writer: &mut W, request: &Request) -> Result<(), WireError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let bytes = request.to_line();
    tokio::time::timeout(DEFAULT_WRITE_TIMEOUT, async {
        writer.write_all(bytes.as_bytes()).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| WireError::WriteTimeout)??;
    Ok(())
}

/// Reads one response line, as written by [`write_response`]. Used by
/// the CLI client waiting on the daemon's reply.
pub async fn read_response<R>(reader: &mut BufReader<R>) -> Result<Response, WireError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    let read = tokio::time::timeout(DEFAULT_READ_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| WireError::ReadTimeout)??;
    if read == 0 {
        return Err(WireError::Closed);
    }
    Ok(Response::parse(&line)?)
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
