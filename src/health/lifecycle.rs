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
use std::str::FromStr;

use strum_macros::{Display, EnumString, IntoStaticStr};

use crate::error::{Error, Result};

/// Longest component name accepted on the bus.
pub const COMPONENT_NAME_MAX_LEN: usize = 128;

/// Longest lifecycle state string ("INSTALLED").
pub const LIFECYCLE_STATE_MAX_LEN: usize = 9;

/// Component lifecycle states, string-keyed on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Lifecycle {
    New,
    Installed,
    Starting,
    Running,
    Errored,
    Broken,
    Stopping,
    Finished,
}

impl Lifecycle {
    /// Terminal states for lifecycle-completion delivery.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Lifecycle::Broken | Lifecycle::Finished | Lifecycle::Running
        )
    }

    /// Parse the bus representation. Fails `Invalid` for anything that is
    /// not one of the eight state strings.
    pub fn parse(bytes: &[u8]) -> Result<Lifecycle> {
        let text = core::str::from_utf8(bytes).map_err(|_| Error::Invalid)?;
        Lifecycle::from_str(text).map_err(|_| Error::Invalid)
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}
