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

//! systemd-unit health: component-to-unit naming, lifecycle-state queries
//! and updates, and `PropertiesChanged` multiplexing into core-bus
//! subscriptions.

mod component;
pub use component::{
    get_health, get_status, notify_directive, restart_component, strip_lifecycle_suffix,
    unit_name, update_status, verify_component_exists, SERVICE_NAME_MAX_LEN, SERVICE_PREFIX,
    SERVICE_SUFFIX,
};

pub mod dbus;
pub use dbus::SystemdBus;

mod lifecycle;
pub use lifecycle::{Lifecycle, COMPONENT_NAME_MAX_LEN, LIFECYCLE_STATE_MAX_LEN};

mod subscriptions;
pub use subscriptions::{HealthEvents, MAX_HEALTH_SUBSCRIPTIONS};
