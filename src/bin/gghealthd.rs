// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! gghealthd - component health and lifecycle supervisor daemon.
//!
//! Serves `get_status`, `update_status`, `get_health`,
//! `restart_component` and `subscribe_to_lifecycle_completion` on the
//! `gg_health` endpoint, backed by the service manager over D-Bus.

use std::env;
use std::os::linux::net::SocketAddrExt;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::net::{SocketAddr, UnixDatagram};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, Level};

use edge_runtime_core::bus::{Caller, Method, Server};
use edge_runtime_core::error::{Error, Result};
use edge_runtime_core::health::{
    self, HealthEvents, Lifecycle, COMPONENT_NAME_MAX_LEN, LIFECYCLE_STATE_MAX_LEN,
};
use edge_runtime_core::logger;
use edge_runtime_core::obj::{map_validate, Kv, Map, Obj, ObjType, SchemaEntry};

#[derive(Parser)]
#[command(name = "gghealthd", about = "Component health supervisor for the edge agent")]
struct Args {
    /// Core-bus endpoint name to serve
    #[arg(short = 'n', long, default_value = "gg_health")]
    interface_name: String,
}

struct HealthState {
    events: Arc<HealthEvents>,
}

static METHODS: &[Method<HealthState>] = &[
    Method {
        name: b"get_status",
        is_sub: false,
        handler: rpc_get_status,
    },
    Method {
        name: b"update_status",
        is_sub: false,
        handler: rpc_update_status,
    },
    Method {
        name: b"get_health",
        is_sub: false,
        handler: rpc_get_health,
    },
    Method {
        name: b"restart_component",
        is_sub: false,
        handler: rpc_restart_component,
    },
    Method {
        name: b"subscribe_to_deployment_updates",
        is_sub: true,
        handler: rpc_subscribe_to_deployment_updates,
    },
    Method {
        name: b"subscribe_to_lifecycle_completion",
        is_sub: true,
        handler: rpc_subscribe_to_lifecycle_completion,
    },
];

fn component_name_param<'a>(params: Map<'a>, method: &str) -> Result<&'a [u8]> {
    let mut component_name = None;
    map_validate(
        params,
        &mut [SchemaEntry::required(
            b"component_name",
            Some(ObjType::Buf),
            &mut component_name,
        )],
    )
    .map_err(|e| {
        error!(method, "received invalid arguments");
        e
    })?;

    let component_name = component_name.and_then(Obj::as_buf).ok_or(Error::Fatal)?;
    if component_name.len() > COMPONENT_NAME_MAX_LEN {
        error!(method, "`component_name` too long");
        return Err(Error::Range);
    }
    Ok(component_name)
}

fn rpc_get_status(ctx: &HealthState, params: Map<'_>, caller: &Caller<'_>) -> Result<()> {
    let component_name = component_name_param(params, "get_status")?;

    let status = health::get_status(ctx.events.bus(), component_name)?;
    debug!(
        component = %String::from_utf8_lossy(component_name),
        status = %status,
        "component status"
    );

    caller.respond(Obj::Map(&[
        Kv::new(b"component_name", Obj::Buf(component_name)),
        Kv::new(b"lifecycle_state", Obj::Buf(status.as_str().as_bytes())),
    ]))
}

fn rpc_update_status(ctx: &HealthState, params: Map<'_>, caller: &Caller<'_>) -> Result<()> {
    let mut component_name = None;
    let mut state = None;
    map_validate(
        params,
        &mut [
            SchemaEntry::required(b"component_name", Some(ObjType::Buf), &mut component_name),
            SchemaEntry::required(b"lifecycle_state", Some(ObjType::Buf), &mut state),
        ],
    )
    .map_err(|e| {
        error!("update_status received invalid arguments");
        e
    })?;

    let component_name = component_name.and_then(Obj::as_buf).ok_or(Error::Fatal)?;
    let state = state.and_then(Obj::as_buf).ok_or(Error::Fatal)?;

    if component_name.len() > COMPONENT_NAME_MAX_LEN {
        error!("`component_name` too long");
        return Err(Error::Range);
    }
    if state.len() > LIFECYCLE_STATE_MAX_LEN {
        error!("`lifecycle_state` too long");
        return Err(Error::Range);
    }
    let state = Lifecycle::parse(state).map_err(|e| {
        error!("invalid lifecycle_state");
        e
    })?;

    health::update_status(ctx.events.bus(), component_name, state)?;
    caller.respond(Obj::Null)
}

fn rpc_get_health(ctx: &HealthState, _params: Map<'_>, caller: &Caller<'_>) -> Result<()> {
    let status = health::get_health(ctx.events.bus())?;
    caller.respond(Obj::Buf(status.as_bytes()))
}

fn rpc_restart_component(ctx: &HealthState, params: Map<'_>, caller: &Caller<'_>) -> Result<()> {
    let component_name = component_name_param(params, "restart_component")?;
    health::restart_component(ctx.events.bus(), component_name)?;
    caller.respond(Obj::Null)
}

fn rpc_subscribe_to_deployment_updates(
    _ctx: &HealthState,
    _params: Map<'_>,
    _caller: &Caller<'_>,
) -> Result<()> {
    Err(Error::Unsupported)
}

fn rpc_subscribe_to_lifecycle_completion(
    ctx: &HealthState,
    params: Map<'_>,
    caller: &Caller<'_>,
) -> Result<()> {
    let component_name = component_name_param(params, "subscribe_to_lifecycle_completion")?;

    ctx.events.register(component_name, caller.handle())?;

    let events = ctx.events.clone();
    caller.sub_accept(move |closed| events.unregister(closed))?;

    // When the component is already in a terminal state there will be no
    // further signal; deliver the state as an early response.
    let status = match health::get_status(ctx.events.bus(), component_name) {
        Ok(status) => status,
        // Subscription has been accepted.
        Err(_) => return Ok(()),
    };
    if status.is_terminal() {
        debug!("sending early response");
        let _ = caller.sub_respond(Obj::Map(&[
            Kv::new(b"component_name", Obj::Buf(component_name)),
            Kv::new(b"lifecycle_state", Obj::Buf(status.as_str().as_bytes())),
        ]));
    }

    Ok(())
}

/// Best-effort `READY=1` to the service manager's notify socket.
fn sd_notify_ready() {
    let Some(path) = env::var_os("NOTIFY_SOCKET") else {
        return;
    };
    let Ok(sock) = UnixDatagram::unbound() else {
        return;
    };
    let bytes = path.as_bytes();
    if let Some(name) = bytes.strip_prefix(b"@") {
        if let Ok(addr) = SocketAddr::from_abstract_name(name) {
            let _ = sock.send_to_addr(b"READY=1", &addr);
        }
    } else {
        let _ = sock.send_to(b"READY=1", &path);
    }
}

fn run(args: Args) -> Result<()> {
    sd_notify_ready();

    let state = Arc::new(HealthState {
        events: Arc::new(HealthEvents::new()),
    });

    let server = Server::new(&args.interface_name, METHODS, state.clone())?;
    state.events.set_notifier(server.notifier());

    let err = match server.listen() {
        Ok(never) => match never {},
        Err(e) => e,
    };
    error!(error = %err, "exiting");
    Err(err)
}

fn main() -> ExitCode {
    logger::init(Level::INFO);
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
