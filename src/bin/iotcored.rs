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

//! iotcored - MQTT spooler daemon.
//!
//! Bridges the local core-bus to the remote broker: `publish`,
//! `subscribe` (with wildcard fan-out) and `connection_status` on the
//! `aws_iot_mqtt` endpoint, over one persistent TLS session.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, OnceLock};

use clap::Parser;
use tracing::{debug, error, Level};

use edge_runtime_core::bus::{Caller, Method, Notifier, Server};
use edge_runtime_core::config;
use edge_runtime_core::error::{Error, Result};
use edge_runtime_core::logger;
use edge_runtime_core::mqtt::packet::Qos;
use edge_runtime_core::mqtt::{
    Session, SessionConfig, StatusRegistry, SubscriptionRegistry, MAX_SUBSCRIBE_FILTERS,
};
use edge_runtime_core::obj::{
    map_get, map_validate, BufVec, Kv, Map, Obj, ObjType, SchemaEntry,
};

#[derive(Parser)]
#[command(name = "iotcored", about = "MQTT spooler for the edge agent")]
struct Args {
    /// Broker endpoint
    #[arg(short, long)]
    endpoint: Option<String>,

    /// MQTT client identifier
    #[arg(short, long)]
    id: Option<String>,

    /// Path to the root CA PEM
    #[arg(short, long)]
    rootca: Option<PathBuf>,

    /// Path to the client certificate
    #[arg(short, long)]
    cert: Option<PathBuf>,

    /// Path to the key for the client certificate
    #[arg(short, long)]
    key: Option<PathBuf>,

    /// Core-bus endpoint name to serve
    #[arg(short = 'n', long = "interface_name")]
    interface_name: Option<String>,
}

struct IotcoredState {
    session: OnceLock<Session>,
    registry: Arc<SubscriptionRegistry>,
    status: Arc<StatusRegistry>,
    notifier: OnceLock<Notifier>,
}

impl IotcoredState {
    fn session(&self) -> Result<&Session> {
        self.session.get().ok_or(Error::NoConn)
    }

    fn notifier(&self) -> &Notifier {
        self.notifier.get().expect("set before listen")
    }
}

static METHODS: &[Method<IotcoredState>] = &[
    Method {
        name: b"publish",
        is_sub: false,
        handler: rpc_publish,
    },
    Method {
        name: b"subscribe",
        is_sub: true,
        handler: rpc_subscribe,
    },
    Method {
        name: b"connection_status",
        is_sub: true,
        handler: rpc_connection_status,
    },
];

fn parse_qos(value: Option<Obj<'_>>) -> Result<Qos> {
    let Some(value) = value else {
        return Ok(Qos::AtMostOnce);
    };
    let qos = value.as_i64().ok_or(Error::Fatal)?;
    if !(0..=2).contains(&qos) {
        error!(qos, "qos out of range");
        return Err(Error::Invalid);
    }
    Ok(Qos::try_from(qos as u8).expect("range checked"))
}

fn rpc_publish(ctx: &IotcoredState, params: Map<'_>, caller: &Caller<'_>) -> Result<()> {
    debug!("handling publish request");

    let mut topic = None;
    let mut payload = None;
    let mut qos = None;
    map_validate(
        params,
        &mut [
            SchemaEntry::required(b"topic", Some(ObjType::Buf), &mut topic),
            SchemaEntry::optional(b"payload", Some(ObjType::Buf), &mut payload),
            SchemaEntry::optional(b"qos", Some(ObjType::I64), &mut qos),
        ],
    )
    .map_err(|e| {
        error!("publish received invalid arguments");
        e
    })?;

    let topic = topic.and_then(Obj::as_buf).ok_or(Error::Fatal)?;
    if topic.len() > u16::MAX as usize {
        error!("publish topic too large");
        return Err(Error::Range);
    }
    let payload = payload.and_then(Obj::as_buf).unwrap_or(&[]);
    let qos = parse_qos(qos)?;

    ctx.session()?.publish(topic, payload, qos)?;
    caller.respond(Obj::Null)
}

fn rpc_subscribe(ctx: &IotcoredState, params: Map<'_>, caller: &Caller<'_>) -> Result<()> {
    debug!("handling subscribe request");

    let mut filter_storage: [&[u8]; MAX_SUBSCRIBE_FILTERS] = [&[]; MAX_SUBSCRIBE_FILTERS];
    let mut filters = BufVec::new(&mut filter_storage);

    match map_get(params, b"topic_filter") {
        Some(Obj::Buf(filter)) => filters.push(filter)?,
        Some(Obj::List(list)) => {
            if list.is_empty() {
                error!("subscribe must have at least one topic filter");
                return Err(Error::Invalid);
            }
            if list.len() > MAX_SUBSCRIBE_FILTERS {
                error!("subscribe received more topic filters than supported");
                return Err(Error::Unsupported);
            }
            filters.append_list(list).map_err(|e| {
                error!("subscribe received invalid arguments");
                e
            })?;
        }
        _ => {
            error!("subscribe received invalid arguments");
            return Err(Error::Invalid);
        }
    }

    for filter in filters.as_bufs() {
        if filter.len() > u16::MAX as usize {
            error!("topic filter too large");
            return Err(Error::Range);
        }
    }

    let mut qos = None;
    let mut virtual_sub = None;
    map_validate(
        params,
        &mut [
            SchemaEntry::optional(b"qos", Some(ObjType::I64), &mut qos),
            SchemaEntry::optional(b"virtual", Some(ObjType::Bool), &mut virtual_sub),
        ],
    )?;
    let qos = parse_qos(qos)?;
    let virtual_sub = virtual_sub.and_then(Obj::as_bool).unwrap_or(false);

    let handle = caller.handle();
    ctx.registry.register(filters.as_bufs(), handle, qos)?;

    if !virtual_sub {
        if let Err(e) = ctx.session()?.subscribe(filters.as_bufs(), qos) {
            // Roll back the claimed slots; the broker never saw them.
            let _ = ctx.registry.unregister(handle);
            return Err(e);
        }
    }

    let registry = ctx.registry.clone();
    let session = ctx.session.get().cloned();
    caller.sub_accept(move |closed| {
        let freed = registry.unregister(closed);
        if let Some(session) = &session {
            for batch in freed.chunks(MAX_SUBSCRIBE_FILTERS) {
                let refs: Vec<&[u8]> = batch.iter().map(|f| f.as_slice()).collect();
                let _ = session.unsubscribe(&refs);
            }
        }
    })
}

fn rpc_connection_status(ctx: &IotcoredState, _params: Map<'_>, caller: &Caller<'_>) -> Result<()> {
    let handle = caller.handle();
    ctx.status.register(handle)?;

    let status = ctx.status.clone();
    caller.sub_accept(move |closed| status.unregister(closed))?;

    // Send a status update as soon as the subscription is accepted. A
    // transition between this read and the send may reorder against the
    // transition's own update; see the registry docs.
    let connected = ctx.session.get().is_some_and(Session::connected);
    ctx.status.send_current(handle, connected, ctx.notifier());
    Ok(())
}

fn config_string(key_path: &[&[u8]]) -> Result<String> {
    config::read_str(key_path)
}

fn nucleus_config_string(suffix: &[&[u8]]) -> Result<String> {
    let mut path: Vec<&[u8]> = vec![
        b"services",
        b"aws.greengrass.NucleusLite",
        b"configuration",
    ];
    path.extend_from_slice(suffix);
    config::read_str(&path)
}

fn env_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| env::var(name).ok())
}

fn resolve_config(args: Args) -> Result<(SessionConfig, String)> {
    let endpoint = match args.endpoint {
        Some(endpoint) => endpoint,
        None => nucleus_config_string(&[b"iotDataEndpoint"])?,
    };
    let id = match args.id {
        Some(id) => id,
        None => config_string(&[b"system", b"thingName"])?,
    };
    let rootca = match args.rootca {
        Some(path) => path,
        None => config_string(&[b"system", b"rootCaPath"])?.into(),
    };
    let cert = match args.cert {
        Some(path) => path,
        None => config_string(&[b"system", b"certificateFilePath"])?.into(),
    };
    let key = match args.key {
        Some(path) => path,
        None => config_string(&[b"system", b"privateKeyPath"])?.into(),
    };

    let proxy_uri = nucleus_config_string(&[b"networkProxy", b"proxy", b"url"])
        .ok()
        .or_else(|| env_var(&["https_proxy", "HTTPS_PROXY"]));
    let no_proxy = nucleus_config_string(&[b"networkProxy", b"noproxy"])
        .ok()
        .or_else(|| env_var(&["no_proxy", "NO_PROXY"]));

    let config = SessionConfig::builder()
        .endpoint(endpoint)
        .client_id(id)
        .root_ca(rootca)
        .cert(cert)
        .key(key)
        .proxy_uri(proxy_uri)
        .no_proxy(no_proxy)
        .build()
        .map_err(|e| {
            error!(error = %e, "incomplete MQTT configuration");
            Error::Config
        })?;

    let interface = args
        .interface_name
        .unwrap_or_else(|| "aws_iot_mqtt".to_owned());
    Ok((config, interface))
}

fn run(args: Args) -> Result<()> {
    let (session_config, interface) = resolve_config(args)?;

    let state = Arc::new(IotcoredState {
        session: OnceLock::new(),
        registry: Arc::new(SubscriptionRegistry::new()),
        status: Arc::new(StatusRegistry::new()),
        notifier: OnceLock::new(),
    });

    let server = Server::new(&interface, METHODS, state.clone())?;
    let notifier = server.notifier();
    let _ = state.notifier.set(notifier.clone());

    let msg_state = state.clone();
    let msg_notifier = notifier.clone();
    let on_message = move |topic: &[u8], payload: &[u8]| {
        let pairs = [
            Kv::new(b"topic", Obj::Buf(topic)),
            Kv::new(b"payload", Obj::Buf(payload)),
        ];
        msg_state.registry.receive(topic, |handle| {
            let _ = msg_notifier.sub_respond(handle, Obj::Map(&pairs));
        });
    };

    let status_state = state.clone();
    let status_notifier = notifier;
    let on_status = move |connected: bool| {
        status_state.status.send(connected, &status_notifier);
    };

    let replay_state = state.clone();
    let on_connect = move |session: &Session| {
        replay_state
            .registry
            .replay(|filter, qos| session.subscribe(&[filter], qos));
    };

    let session = Session::start(
        session_config,
        Box::new(on_message),
        Box::new(on_status),
        Box::new(on_connect),
    )?;
    let _ = state.session.set(session);

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
