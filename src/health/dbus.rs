/**
 * MIT License
 *
 * Copyright (c) 2025 Takatoshi Kondo
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, error};
use zbus::blocking::{Connection, Proxy};
use zbus::zvariant::OwnedObjectPath;

use crate::error::{Error, Result};
use crate::health::lifecycle::Lifecycle;

pub const DESTINATION: &str = "org.freedesktop.systemd1";
pub const MANAGER_PATH: &str = "/org/freedesktop/systemd1";
pub const MANAGER_INTERFACE: &str = "org.freedesktop.systemd1.Manager";
pub const UNIT_INTERFACE: &str = "org.freedesktop.systemd1.Unit";
pub const SERVICE_INTERFACE: &str = "org.freedesktop.systemd1.Service";

/// Repeated connection failure for this long escalates `NoConn` to
/// `Fatal`.
const CONNECT_FAILURE_TIMEOUT: Duration = Duration::from_secs(30);

/// Access point for the service manager's system bus.
///
/// Tracks connect failures so callers can distinguish a transient outage
/// (`NoConn`) from a supervisor that has been unreachable long enough to
/// be considered broken (`Fatal`).
pub struct SystemdBus {
    first_connect_failure: Mutex<Option<Instant>>,
}

impl SystemdBus {
    pub fn new() -> Self {
        SystemdBus {
            first_connect_failure: Mutex::new(None),
        }
    }

    pub fn open(&self) -> Result<Connection> {
        match Connection::system() {
            Ok(conn) => {
                *self.first_connect_failure.lock().unwrap() = None;
                Ok(conn)
            }
            Err(e) => {
                error!(error = %e, "unable to open system bus");
                let mut first = self.first_connect_failure.lock().unwrap();
                let now = Instant::now();
                let first_at = *first.get_or_insert(now);
                if now.duration_since(first_at) >= CONNECT_FAILURE_TIMEOUT {
                    Err(Error::Fatal)
                } else {
                    Err(Error::NoConn)
                }
            }
        }
    }
}

impl Default for SystemdBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a D-Bus failure into the shared error taxonomy.
pub fn translate_dbus_error(err: &zbus::Error) -> Error {
    match err {
        zbus::Error::InputOutput(_) => Error::NoConn,
        zbus::Error::MethodError(name, _, _) => match name.as_str() {
            "org.freedesktop.systemd1.NoSuchUnit"
            | "org.freedesktop.DBus.Error.UnknownObject"
            | "org.freedesktop.DBus.Error.ServiceUnknown"
            | "org.freedesktop.DBus.Error.FileNotFound" => Error::NoEntry,
            "org.freedesktop.DBus.Error.NoMemory" => Error::NoMem,
            "org.freedesktop.DBus.Error.AccessDenied"
            | "org.freedesktop.DBus.Error.InvalidArgs" => Error::Fatal,
            "org.freedesktop.DBus.Error.NoReply"
            | "org.freedesktop.DBus.Error.Timeout"
            | "org.freedesktop.DBus.Error.Disconnected" => Error::NoConn,
            _ => Error::Failure,
        },
        _ => Error::Failure,
    }
}

/// Resolve a unit name to its object path via `Manager.LoadUnit`.
pub fn load_unit(conn: &Connection, unit: &str) -> Result<OwnedObjectPath> {
    let reply = conn
        .call_method(
            Some(DESTINATION),
            MANAGER_PATH,
            Some(MANAGER_INTERFACE),
            "LoadUnit",
            &(unit,),
        )
        .map_err(|e| {
            error!(unit, error = %e, "unable to load unit");
            translate_dbus_error(&e)
        })?;
    let path: OwnedObjectPath = reply.body().deserialize().map_err(|_| Error::Fatal)?;
    debug!(unit, path = %path, "resolved unit path");
    Ok(path)
}

/// Enable unit state-change signals for this connection.
pub fn manager_subscribe(conn: &Connection) -> Result<()> {
    conn.call_method(
        Some(DESTINATION),
        MANAGER_PATH,
        Some(MANAGER_INTERFACE),
        "Subscribe",
        &(),
    )
    .map_err(|e| {
        error!(error = %e, "failed to enable bus signals");
        translate_dbus_error(&e)
    })?;
    Ok(())
}

pub fn restart_unit(conn: &Connection, unit: &str) -> Result<()> {
    conn.call_method(
        Some(DESTINATION),
        MANAGER_PATH,
        Some(MANAGER_INTERFACE),
        "RestartUnit",
        &(unit, "replace"),
    )
    .map_err(|e| {
        error!(unit, error = %e, "failed to restart unit");
        translate_dbus_error(&e)
    })?;
    Ok(())
}

pub fn reset_failed_unit(conn: &Connection, unit: &str) -> Result<()> {
    conn.call_method(
        Some(DESTINATION),
        MANAGER_PATH,
        Some(MANAGER_INTERFACE),
        "ResetFailedUnit",
        &(unit,),
    )
    .map_err(|e| translate_dbus_error(&e))?;
    Ok(())
}

fn unit_property<T>(
    conn: &Connection,
    unit_path: &OwnedObjectPath,
    interface: &'static str,
    name: &str,
) -> Result<T>
where
    T: TryFrom<zbus::zvariant::OwnedValue>,
    T::Error: Into<zbus::Error>,
{
    let proxy = Proxy::new(conn, DESTINATION, unit_path.clone(), interface)
        .map_err(|e| translate_dbus_error(&e))?;
    proxy.get_property::<T>(name).map_err(|e| {
        error!(property = name, error = %e, "unable to read unit property");
        translate_dbus_error(&e)
    })
}

/// Read `Unit.ActiveState` and translate it into a lifecycle state,
/// consulting the service's result, restart counter and inactive-enter
/// timestamp when the active state alone is ambiguous.
pub fn lifecycle_state(conn: &Connection, unit_path: &OwnedObjectPath) -> Result<Lifecycle> {
    let active_state: String = unit_property(conn, unit_path, UNIT_INTERFACE, "ActiveState")?;
    debug!(active_state, "read ActiveState");

    match active_state.as_str() {
        "activating" => Ok(Lifecycle::Starting),
        "active" => Ok(Lifecycle::Running),
        // An active component whose systemd (not component) configuration
        // is reloading.
        "reloading" => Ok(Lifecycle::Running),
        "deactivating" => Ok(Lifecycle::Stopping),
        "inactive" | "failed" => component_result(conn, unit_path),
        other => {
            error!(active_state = other, "unknown ActiveState");
            Err(Error::Fatal)
        }
    }
}

/// Disambiguate `inactive`/`failed`.
fn component_result(conn: &Connection, unit_path: &OwnedObjectPath) -> Result<Lifecycle> {
    let timestamp: u64 = unit_property(
        conn,
        unit_path,
        UNIT_INTERFACE,
        "InactiveEnterTimestampMonotonic",
    )?;
    debug!(timestamp, "read InactiveEnterTimestampMonotonic");

    // A component that has not run yet is installed.
    if timestamp == 0 {
        return Ok(Lifecycle::Installed);
    }

    let n_restarts: u32 = unit_property(conn, unit_path, SERVICE_INTERFACE, "NRestarts")?;
    debug!(n_restarts, "read NRestarts");
    if n_restarts >= 3 {
        error!("component is broken (exceeded retry limit)");
        return Ok(Lifecycle::Broken);
    }

    let result: String = unit_property(conn, unit_path, SERVICE_INTERFACE, "Result")?;
    debug!(result, "read Result");
    if result == "success" {
        Ok(Lifecycle::Finished)
    } else {
        Ok(Lifecycle::Errored)
    }
}
