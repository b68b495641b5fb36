// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatches one parsed [`Request`] against the shared [`Supervisor`]
//! and renders the [`Response`].

use autophone_core::{Clock, DeviceId};
use autophone_wire::{read_request, write_response, DeviceTarget, Request, Response, WireError};
use tokio::io::BufReader;
use tokio::net::TcpStream;

use super::ListenerCtx;

pub async fn handle_connection<C: Clock + 'static>(stream: TcpStream, ctx: &ListenerCtx<C>) -> Result<(), WireError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let request = read_request(&mut reader).await?;
    let response = dispatch(request, ctx);
    write_response(&mut write_half, &response).await
}

fn dispatch<C: Clock + 'static>(request: Request, ctx: &ListenerCtx<C>) -> Response {
    match request {
        Request::Status => Response::OkWithBody(ctx.supervisor.lock().status()),

        Request::AddDevice { serial } => {
            let id = ctx.supervisor.lock().add_device(&serial);
            Response::OkWithBody(serde_json::json!({ "device_id": id.to_string() }))
        }

        Request::TriggerJobs { payload } => match ctx.supervisor.lock().trigger_jobs(payload) {
            Ok(()) => Response::Ok,
            Err(err) => Response::error(err.to_string()),
        },

        Request::Log { message } => {
            tracing::info!(target: "autophone_log", "{message}");
            Response::Ok
        }

        Request::Restart | Request::Shutdown | Request::Stop => {
            ctx.shutdown.notify_one();
            Response::Ok
        }

        Request::Device { target, verb, args: _ } => dispatch_device(&ctx.supervisor, &verb, &target),
    }
}

/// Routes one of the nine `device-<verb>` console commands (§6) to the
/// matching [`Supervisor`](crate::supervisor::Supervisor) method.
/// `DeviceTarget::All` targets every worker for the verbs that accept
/// it; `device-status`/`device-is_alive` answer for a single device
/// only, since a fleet-wide answer is already `autophone-status`.
fn dispatch_device<C: Clock + 'static>(supervisor: &parking_lot::Mutex<crate::supervisor::Supervisor<C>>, verb: &str, target: &DeviceTarget) -> Response {
    let id = match target {
        DeviceTarget::All => None,
        DeviceTarget::Id(id) => Some(DeviceId::from_string(id)),
    };

    match verb {
        "stop" | "shutdown" => ok_or_error(supervisor.lock().stop_device(id.as_ref())),
        "disable" => ok_or_error(supervisor.lock().disable_device(id.as_ref())),
        "enable" => ok_or_error(supervisor.lock().enable_device(id.as_ref())),
        "reboot" => ok_or_error(supervisor.lock().reboot_device(id.as_ref())),
        "restart" => ok_or_error(supervisor.lock().restart_device(id.as_ref())),
        "ping" => ok_or_error(supervisor.lock().ping_device(id.as_ref())),

        "is_alive" => match supervisor.lock().is_alive(id.as_ref()) {
            Ok(alive) => Response::OkWithBody(serde_json::json!({ "alive": alive })),
            Err(err) => Response::error(err.to_string()),
        },

        "status" => {
            let supervisor = supervisor.lock();
            match &id {
                Some(id) => match supervisor.device_status(id) {
                    Ok(body) => Response::OkWithBody(body),
                    Err(err) => Response::error(err.to_string()),
                },
                None => Response::OkWithBody(supervisor.status()),
            }
        }

        other => Response::error(format!("unsupported device verb {other:?}")),
    }
}

fn ok_or_error(result: Result<(), crate::supervisor::SupervisorError>) -> Response {
    match result {
        Ok(()) => Response::Ok,
        Err(err) => Response::error(err.to_string()),
    }
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;
