// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `autophone`: an operator's thin client for the Command Console
//! (§4.6, §6). Every subcommand sends exactly one request line over
//! TCP and prints the daemon's reply; it holds no state of its own.

mod client;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use autophone_core::Config;
use autophone_wire::{DeviceTarget, Request, Response};
use clap::{Parser, Subcommand};

use crate::client::{ConsoleError, ConsoleTarget};

#[derive(Parser)]
#[command(
    name = "autophone",
    version = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH")),
    about = "Operator console for the autophone fleet controller"
)]
struct Cli {
    /// Console host to connect to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Console port to connect to (falls back to the daemon's own config file)
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a status report for every worker
    Status,
    /// Register and start a worker for a newly attached device
    AddDevice {
        /// Device serial number, as reported by the adb host tools
        serial: String,
    },
    /// Stop every worker, checkpoint the store, and let the process exit
    Restart,
    /// Stop the event bus, console, submitter, and every worker, then exit
    Shutdown,
    /// Immediate stop (alias for `shutdown`)
    Stop,
    /// Manually enqueue a job
    TriggerJobs {
        /// JSON payload, e.g. `{"build": "...", "test_names": [], "devices": []}`.
        /// Prefix with `@` to read the payload from a file instead.
        payload: String,
    },
    /// Append a line to the daemon's log
    Log {
        /// Words are joined with a single space
        message: Vec<String>,
    },
    /// Send a device-scoped verb (e.g. `reboot`, `shell`, `stop`)
    Device {
        /// Device id, serial number, or `all`
        target: String,
        verb: String,
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let port = match cli.port {
        Some(port) => port,
        None => match resolve_configured_port() {
            Ok(port) => port,
            Err(err) => {
                eprintln!("autophone: {err}");
                return ExitCode::FAILURE;
            }
        },
    };

    let request = match build_request(cli.command) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("autophone: {err}");
            return ExitCode::FAILURE;
        }
    };

    let target = ConsoleTarget { host: cli.host, port };
    match client::send(&target, &request).await {
        Ok(response) => render(response),
        Err(err) => {
            eprintln!("autophone: {err}");
            ExitCode::FAILURE
        }
    }
}

fn build_request(command: Command) -> Result<Request, String> {
    match command {
        Command::Status => Ok(Request::Status),
        Command::AddDevice { serial } => Ok(Request::AddDevice { serial }),
        Command::Restart => Ok(Request::Restart),
        Command::Shutdown => Ok(Request::Shutdown),
        Command::Stop => Ok(Request::Stop),
        Command::TriggerJobs { payload } => {
            let raw = match payload.strip_prefix('@') {
                Some(path) => std::fs::read_to_string(path).map_err(|e| format!("reading {path}: {e}"))?,
                None => payload,
            };
            let payload = serde_json::from_str(&raw).map_err(|e| format!("invalid JSON payload: {e}"))?;
            Ok(Request::TriggerJobs { payload })
        }
        Command::Log { message } => Ok(Request::Log { message: message.join(" ") }),
        Command::Device { target, verb, args } => {
            let target = if target == "all" { DeviceTarget::All } else { DeviceTarget::Id(target) };
            Ok(Request::Device { target, verb, args })
        }
    }
}

fn render(response: Response) -> ExitCode {
    match response {
        Response::Ok => {
            println!("ok");
            ExitCode::SUCCESS
        }
        Response::OkWithBody(value) => {
            match serde_json::to_string_pretty(&value) {
                Ok(pretty) => println!("{pretty}"),
                Err(_) => println!("{value}"),
            }
            ExitCode::SUCCESS
        }
        Response::Error(reason) => {
            eprintln!("error: {reason}");
            ExitCode::FAILURE
        }
    }
}

/// Reads the daemon's own config file (`$AUTOPHONE_CONFIG`, default
/// `autophone.ini`) purely to learn which port it listens on, so an
/// operator doesn't have to repeat `--port` on every invocation.
fn resolve_configured_port() -> Result<u16, ConsoleError> {
    let env: HashMap<String, String> = std::env::vars().collect();
    let config_path = env.get("AUTOPHONE_CONFIG").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("autophone.ini"));
    let contents = std::fs::read_to_string(&config_path).ok();
    let config = Config::load(contents.as_deref(), &env).map_err(ConsoleError::Config)?;
    Ok(config.console_port)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
