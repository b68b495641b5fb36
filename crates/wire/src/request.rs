// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsing for the Command Console's line-oriented ASCII protocol (§6).
//! Every request is exactly one line: a verb, optionally followed by
//! whitespace-separated arguments.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("empty request line")]
    Empty,
    #[error("unknown verb {0:?}")]
    UnknownVerb(String),
    #[error("{verb} requires an argument")]
    MissingArgument { verb: &'static str },
    #[error("{verb} payload was not valid JSON: {reason}")]
    InvalidJson { verb: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceTarget {
    Id(String),
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Status,
    AddDevice { serial: String },
    Restart,
    Shutdown,
    Stop,
    TriggerJobs { payload: serde_json::Value },
    Log { message: String },
    Device {
        target: DeviceTarget,
        verb: String,
        args: Vec<String>,
    },
}

impl Request {
    /// Renders this request as the line a client writes to the console
    /// connection, newline-terminated. Inverse of [`Request::parse`].
    pub fn to_line(&self) -> String {
        match self {
            Request::Status => "autophone-status\n".to_string(),
            Request::AddDevice { serial } => format!("autophone-add-device {serial}\n"),
            Request::Restart => "autophone-restart\n".to_string(),
            Request::Shutdown => "autophone-shutdown\n".to_string(),
            Request::Stop => "autophone-stop\n".to_string(),
            Request::TriggerJobs { payload } => format!("autophone-triggerjobs {payload}\n"),
            Request::Log { message } => format!("autophone-log {message}\n"),
            Request::Device { target, verb, args } => {
                let target = match target {
                    DeviceTarget::All => "all".to_string(),
                    DeviceTarget::Id(id) => id.clone(),
                };
                let mut line = format!("device-{verb} {target}");
                for arg in args {
                    line.push(' ');
                    line.push_str(arg);
                }
                line.push('\n');
                line
            }
        }
    }

    /// Parses one line of the Command Console protocol. The trailing
    /// newline, if any, should already be stripped by the caller.
    pub fn parse(line: &str) -> Result<Self, RequestError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(RequestError::Empty);
        }

        let mut parts = line.splitn(2, char::is_whitespace);
        let verb = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or("").trim();

        match verb {
            "autophone-status" => Ok(Request::Status),
            "autophone-add-device" => {
                if rest.is_empty() {
                    return Err(RequestError::MissingArgument { verb: "autophone-add-device" });
                }
                Ok(Request::AddDevice { serial: rest.to_string() })
            }
            "autophone-restart" => Ok(Request::Restart),
            "autophone-shutdown" => Ok(Request::Shutdown),
            "autophone-stop" => Ok(Request::Stop),
            "autophone-triggerjobs" => {
                if rest.is_empty() {
                    return Err(RequestError::MissingArgument { verb: "autophone-triggerjobs" });
                }
                let payload = serde_json::from_str(rest).map_err(|e| RequestError::InvalidJson {
                    verb: "autophone-triggerjobs",
                    reason: e.to_string(),
                })?;
                Ok(Request::TriggerJobs { payload })
            }
            "autophone-log" => {
                if rest.is_empty() {
                    return Err(RequestError::MissingArgument { verb: "autophone-log" });
                }
                Ok(Request::Log { message: rest.to_string() })
            }
            other if other.starts_with("device-") => {
                let verb = other.trim_start_matches("device-").to_string();
                let mut args = rest.split_whitespace();
                let target = match args.next() {
                    Some("all") => DeviceTarget::All,
                    Some(id) => DeviceTarget::Id(id.to_string()),
                    None => return Err(RequestError::MissingArgument { verb: "device-*" }),
                };
                Ok(Request::Device {
                    target,
                    verb,
                    args: args.map(str::to_string).collect(),
                })
            }
            other => Err(RequestError::UnknownVerb(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
