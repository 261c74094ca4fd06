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

//! FFI Helper Macros
//!
//! Every macro that can return early has `_or_return` in its name. On the
//! early-return path the error is recorded with [`crate::Error::set_last`],
//! which also applies the contract-violation policy.

use std::ffi::{c_char, CStr};

use crate::error::{Error, Result};

/// Reads a NUL-terminated C string of at most `max_len` bytes.
///
/// Never reads past the terminator, so a short string near the end of a
/// mapping is safe.
///
/// # Safety
/// `ptr` must be non-null and point to a NUL-terminated string, or to at
/// least `max_len + 1` readable bytes.
pub(crate) unsafe fn bounded_cstr(ptr: *const c_char, max_len: usize, name: &str) -> Result<String> {
    let mut len = 0;
    while *ptr.add(len) != 0 {
        if len == max_len {
            return Err(Error::StringTooLong(format!("{name} exceeds {max_len} bytes")));
        }
        len += 1;
    }

    CStr::from_ptr(ptr)
        .to_str()
        .map(str::to_owned)
        .map_err(|_| Error::InvalidString(format!("{name} is not valid UTF-8")))
}

/// Check pointer not null or early-return with error value
macro_rules! ptr_or_return {
    ($ptr:expr, $err_val:expr) => {
        if $ptr.is_null() {
            $crate::Error::NullParameter(stringify!($ptr).to_string()).set_last();
            return $err_val;
        }
    };
}

/// Convert a C string, bounded by `limits.max_name_len`, or early-return
/// with the error value.
macro_rules! cstr_or_return {
    ($ptr:expr, $err_val:expr) => {{
        let ptr = $ptr;
        if ptr.is_null() {
            $crate::Error::NullParameter(stringify!($ptr).to_string()).set_last();
            return $err_val;
        }
        let max_len = analytics::settings::get_thread_local_settings()
            .limits
            .max_name_len;
        // SAFETY: non-null checked above, the caller guarantees termination.
        match unsafe { $crate::macros::bounded_cstr(ptr, max_len, stringify!($ptr)) } {
            Ok(s) => s,
            Err(err) => {
                err.set_last();
                return $err_val;
            }
        }
    }};
}

/// Handle Result or early-return with error value
///
/// Any error convertible into [`crate::Error`] is accepted.
macro_rules! ok_or_return {
    ($result:expr, $err_val:expr) => {
        match $result {
            Ok(value) => value,
            Err(err) => {
                $crate::Error::from(err).set_last();
                return $err_val;
            }
        }
    };
}

/// Handle Result, early-return with -1 on error
macro_rules! ok_or_return_int {
    ($result:expr) => {
        $crate::macros::ok_or_return!($result, -1)
    };
}

/// Handle Result, early-return with null on error
macro_rules! ok_or_return_null {
    ($result:expr) => {
        $crate::macros::ok_or_return!($result, std::ptr::null_mut())
    };
}

/// Handle Result, early-return with 0 on error
macro_rules! ok_or_return_zero {
    ($result:expr) => {
        $crate::macros::ok_or_return!($result, 0)
    };
}

pub(crate) use cstr_or_return;
pub(crate) use ok_or_return;
pub(crate) use ok_or_return_int;
pub(crate) use ok_or_return_null;
pub(crate) use ok_or_return_zero;
pub(crate) use ptr_or_return;
