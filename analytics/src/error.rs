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

use thiserror::Error;

/// `Error` enumerates errors returned by the analytics operations.
///
/// The display form is always `"Kind: detail"` so that the kind survives
/// being flattened into a C string.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The allocator could not satisfy a request.
    #[error("Allocation: could not allocate {size} bytes")]
    Allocation { size: usize },

    /// A name was rejected before any state was created.
    #[error("InvalidName: {0}")]
    InvalidName(String),

    /// Checked arithmetic on a calculator value overflowed.
    #[error("Overflow: {op} {rhs} overflows {lhs}")]
    Overflow {
        op: &'static str,
        lhs: i32,
        rhs: i32,
    },

    /// Settings could not be parsed or failed validation.
    #[error("BadSettings: {0}")]
    BadSettings(String),
}

impl Error {
    /// Returns the stable error code published to C callers.
    ///
    /// Codes below 100 are reserved for the FFI layer itself.
    pub fn code(&self) -> i32 {
        match self {
            Self::Allocation { .. } => 100,
            Self::InvalidName(_) => 101,
            Self::Overflow { .. } => 102,
            Self::BadSettings(_) => 103,
        }
    }
}

/// A specialized `Result` type for analytics operations.
pub type Result<T> = std::result::Result<T, Error>;
