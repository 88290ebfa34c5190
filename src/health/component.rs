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
use std::process::Command;

use tracing::{debug, error, info, warn};

use crate::config;
use crate::error::{Error, Result};
use crate::health::dbus::{self, SystemdBus};
use crate::health::lifecycle::{Lifecycle, COMPONENT_NAME_MAX_LEN};
use crate::obj::ByteVec;

/// Unit name shape: `ggl.<component>.service`.
pub const SERVICE_PREFIX: &str = "ggl.";
pub const SERVICE_SUFFIX: &str = ".service";
pub const SERVICE_NAME_MAX_LEN: usize =
    SERVICE_PREFIX.len() + COMPONENT_NAME_MAX_LEN + SERVICE_SUFFIX.len();

/// Drop a trailing `.install` / `.bootstrap` lifecycle phase from a
/// component name.
pub fn strip_lifecycle_suffix(component_name: &[u8]) -> &[u8] {
    let name = component_name
        .strip_suffix(b".install".as_slice())
        .unwrap_or(component_name);
    name.strip_suffix(b".bootstrap".as_slice()).unwrap_or(name)
}

/// Qualified systemd unit name for a component.
pub fn unit_name(component_name: &[u8]) -> Result<String> {
    if component_name.is_empty() || component_name.len() > COMPONENT_NAME_MAX_LEN {
        error!("component name too long");
        return Err(Error::Range);
    }

    let mut storage = [0u8; SERVICE_NAME_MAX_LEN];
    let mut name = ByteVec::new(&mut storage);
    let mut ret = Ok(());
    name.chain_append(&mut ret, SERVICE_PREFIX.as_bytes());
    name.chain_append(&mut ret, component_name);
    name.chain_append(&mut ret, SERVICE_SUFFIX.as_bytes());
    ret?;

    let name = String::from_utf8(name.as_slice().to_vec()).map_err(|_| Error::Invalid)?;
    debug!(unit = %name, "qualified service name");
    Ok(name)
}

/// Check a component's version key in the config store for proof of
/// existence. Absence surfaces as `NoEntry` from the config daemon.
pub fn verify_component_exists(component_name: &[u8]) -> Result<()> {
    let stripped = strip_lifecycle_suffix(component_name);
    if stripped.is_empty() || stripped.len() > COMPONENT_NAME_MAX_LEN {
        return Err(Error::Range);
    }

    let version = config::read_str(&[b"services", stripped, b"version"]).map_err(|e| {
        debug!(error = %e, "component version lookup failed");
        e
    })?;
    debug!(version, "component version read");
    Ok(())
}

/// Current lifecycle state of a component.
///
/// The supervisor itself is special-cased so it can always observe its
/// own health: the result reflects whether the system bus is reachable,
/// and the call succeeds regardless.
pub fn get_status(bus: &SystemdBus, component_name: &[u8]) -> Result<Lifecycle> {
    if component_name.len() > COMPONENT_NAME_MAX_LEN {
        error!("component name too long");
        return Err(Error::Range);
    }

    let conn = bus.open();

    if component_name == b"gghealthd" {
        return Ok(match conn {
            Ok(_) => Lifecycle::Running,
            Err(Error::NoConn) => Lifecycle::Errored,
            Err(_) => Lifecycle::Broken,
        });
    }
    let conn = conn?;

    // Only relay lifecycle state for configured components.
    verify_component_exists(component_name)?;

    let unit = unit_name(component_name)?;
    let unit_path = dbus::load_unit(&conn, &unit)?;
    dbus::lifecycle_state(&conn, &unit_path)
}

/// `systemd-notify` directive for a self-reported state; `None` for
/// states with no counterpart on the bus.
pub fn notify_directive(state: Lifecycle) -> Option<&'static str> {
    match state {
        Lifecycle::Starting => Some("--reloading"),
        Lifecycle::Running => Some("--ready"),
        Lifecycle::Stopping => Some("--stopping"),
        _ => None,
    }
}

/// Forward a component's self-reported state to the service manager.
///
/// Only `STARTING`, `RUNNING` and `STOPPING` have a `systemd-notify`
/// directive; the remaining states are no-ops on the bus. The
/// notification runs inside the component's cgroup so the service manager
/// attributes it to the right unit.
pub fn update_status(bus: &SystemdBus, component_name: &[u8], state: Lifecycle) -> Result<()> {
    let directive = notify_directive(state);

    verify_component_exists(component_name)?;
    let unit = unit_name(component_name)?;
    let _conn = bus.open()?;

    let Some(directive) = directive else {
        return Ok(());
    };

    let cgroup = format!("pids:/system.slice/{unit}");
    let status = Command::new("cgexec")
        .args(["-g", &cgroup, "--", "systemd-notify", directive])
        .status();
    match status {
        Ok(code) if code.success() => {}
        Ok(code) => error!(?code, "failed to notify status"),
        Err(e) => error!(error = %e, "failed to notify status"),
    }

    debug!(
        component = %String::from_utf8_lossy(component_name),
        state = %state,
        directive,
        "component reported state update"
    );
    Ok(())
}

/// Whole-supervisor health summary.
pub fn get_health(bus: &SystemdBus) -> Result<&'static str> {
    if bus.open().is_err() {
        return Ok("UNHEALTHY");
    }
    Ok("HEALTHY")
}

/// Restart a component's unit, resetting its failure counter so NRestarts
/// reflects only post-restart behavior.
pub fn restart_component(bus: &SystemdBus, component_name: &[u8]) -> Result<()> {
    if component_name.len() > COMPONENT_NAME_MAX_LEN {
        error!("component name too long");
        return Err(Error::Range);
    }

    let conn = bus.open()?;
    verify_component_exists(component_name)?;
    let unit = unit_name(component_name)?;

    dbus::restart_unit(&conn, &unit)?;

    if let Err(e) = dbus::reset_failed_unit(&conn, &unit) {
        warn!(unit, error = %e, "failed to reset failure counter");
    }

    info!(
        component = %String::from_utf8_lossy(component_name),
        "successfully restarted component"
    );
    Ok(())
}
