// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Responses to a Command Console request (§6): a single `OK` line, an
//! `OK` line followed by a JSON body (for `autophone-status`), or an
//! `ERROR: <reason>` line.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    OkWithBody(serde_json::Value),
    Error(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseError {
    #[error("empty response line")]
    Empty,
    #[error("response body was not valid JSON: {0}")]
    InvalidJson(String),
    #[error("unrecognized response line {0:?}")]
    Malformed(String),
}

impl Response {
    pub fn error(reason: impl Into<String>) -> Self {
        Response::Error(reason.into())
    }

    /// Renders the response as the bytes written to the console
    /// connection, newline-terminated.
    pub fn to_wire_string(&self) -> String {
        match self {
            Response::Ok => "OK\n".to_string(),
            Response::OkWithBody(value) => format!("OK {value}\n"),
            Response::Error(reason) => format!("ERROR: {reason}\n"),
        }
    }

    /// Parses one response line, as written by [`Response::to_wire_string`].
    /// Used by the CLI client reading the daemon's reply.
    pub fn parse(line: &str) -> Result<Self, ResponseError> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            return Err(ResponseError::Empty);
        }
        if let Some(reason) = line.strip_prefix("ERROR: ") {
            return Ok(Response::Error(reason.to_string()));
        }
        if line == "OK" {
            return Ok(Response::Ok);
        }
        if let Some(body) = line.strip_prefix("OK ") {
            let value = serde_json::from_str(body).map_err(|e| ResponseError::InvalidJson(e.to_string()))?;
            return Ok(Response::OkWithBody(value));
        }
        Err(ResponseError::Malformed(line.to_string()))
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
