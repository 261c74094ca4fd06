// Copyright 2024 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

#![doc = include_str!("../README.md")]

// Declare foundational modules first
mod error;
mod last_error;

// Then macros that depend on them
pub(crate) mod macros;

// Then everything else
mod c_api;
mod handle_map;
mod tracking;

pub use analytics::{RawDataPoint, SYSTEM_LIMIT};
pub use c_api::*;
pub use error::{Error, Result};
#[doc(hidden)]
pub use handle_map::{get_handles, Handle, HandleMap, NULL_HANDLE};
pub use last_error::LastError;
#[doc(hidden)]
pub use tracking::{get_registry, to_c_string, PointerRegistry};

/// Serializes unit tests that free through the global pointer registry.
///
/// A freed address can be handed out again to another test thread, so a
/// deliberate double free must not race with other tracked allocations.
#[cfg(test)]
pub(crate) fn serial_guard() -> std::sync::MutexGuard<'static, ()> {
    static SERIAL: std::sync::Mutex<()> = std::sync::Mutex::new(());
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
