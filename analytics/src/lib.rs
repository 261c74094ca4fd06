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
#![cfg_attr(docsrs, feature(doc_cfg))]

/// The calculator resource that foreign callers reach through an opaque handle.
pub mod calculator;
/// Labeled 2D points and their heap lifecycle.
pub mod data_point;
mod error;
/// Thread-local configuration.
pub mod settings;

pub use calculator::Calculator;
pub use data_point::{distance_from_origin, DataPoint, OwnedPoint, RawDataPoint, SYSTEM_LIMIT};
pub use error::{Error, Result};
pub use settings::Settings;

/// The package name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// The package version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
