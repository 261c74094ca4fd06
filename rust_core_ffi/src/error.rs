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

use analytics::settings::{get_thread_local_settings, ViolationPolicy};
use log::{debug, error};
use thiserror::Error;

use crate::last_error::LastError;

#[derive(Error, Debug)]
/// Defines all possible errors that can occur at the C boundary
pub enum Error {
    #[error("NullParameter: {0}")]
    NullParameter(String),
    #[error("StringTooLong: {0}")]
    StringTooLong(String),
    #[error("InvalidString: {0}")]
    InvalidString(String),
    #[error("NullHandle: {0}")]
    NullHandle(String),
    #[error("StaleHandle: {0:#x}")]
    StaleHandle(u64),
    #[error("WrongHandleType: {0:#x}")]
    WrongHandleType(u64),
    #[error("UntrackedPointer: {0:#x}")]
    UntrackedPointer(usize),
    #[error("WrongPointerType: {0:#x}")]
    WrongPointerType(usize),
    #[error(transparent)]
    Analytics(#[from] analytics::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type
    pub fn code(&self) -> i32 {
        match self {
            Self::NullParameter(_) => 1,
            Self::StringTooLong(_) => 2,
            Self::InvalidString(_) => 3,
            Self::NullHandle(_) => 10,
            Self::StaleHandle(_) => 11,
            Self::WrongHandleType(_) => 12,
            Self::UntrackedPointer(_) => 13,
            Self::WrongPointerType(_) => 14,
            Self::Analytics(e) => e.code(),
        }
    }

    /// True for caller misuse: use after destroy, double release, a null or
    /// foreign handle. These are never retried or recovered from.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::NullHandle(_)
                | Self::StaleHandle(_)
                | Self::WrongHandleType(_)
                | Self::UntrackedPointer(_)
                | Self::WrongPointerType(_)
        )
    }

    /// Records this error as the thread's last error.
    ///
    /// Contract violations are logged first and, unless the thread-local
    /// `violations.policy` is `report`, abort the process.
    pub fn set_last(self) {
        if self.is_contract_violation() {
            error!("contract violation: {self}");
            if get_thread_local_settings().violations.policy == ViolationPolicy::Abort {
                std::process::abort();
            }
        } else {
            debug!("{self}");
        }
        LastError::from(self).set_last();
    }

    /// Returns the last error message stored in thread-local storage
    pub fn last_message() -> Option<String> {
        LastError::last_message()
    }
}

impl From<Error> for LastError {
    fn from(err: Error) -> Self {
        LastError::new(err.code(), err.to_string())
    }
}
