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

use std::cell::RefCell;

thread_local! {
    static LAST_ERROR: RefCell<Option<LastError>> = const { RefCell::new(None) };
}

/// The most recent failure on this thread, as seen by C callers.
///
/// # Error Code Ranges
///
/// - **0**: No error
/// - **1-99**: FFI layer errors (null parameters, handle and pointer misuse)
/// - **100+**: analytics errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    code: i32,
    message: String,
}

impl LastError {
    pub fn new<S: Into<String>>(code: i32, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Peeks at the last error message without clearing it
    pub fn last_message() -> Option<String> {
        LAST_ERROR.with(|prev| prev.borrow().as_ref().map(|e| e.message.clone()))
    }

    /// Peeks at the last error code without clearing it. Returns 0 if no
    /// error is set.
    pub fn last_code() -> i32 {
        LAST_ERROR.with(|prev| prev.borrow().as_ref().map(|e| e.code).unwrap_or(0))
    }

    /// Sets this error as the last error
    pub fn set_last(self) {
        LAST_ERROR.with(|prev| *prev.borrow_mut() = Some(self));
    }

    /// Takes the last error and clears it
    pub fn take_last() -> Option<LastError> {
        LAST_ERROR.with(|prev| prev.borrow_mut().take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_by_default() {
        assert_eq!(LastError::last_code(), 0);
        assert_eq!(LastError::last_message(), None);
    }

    #[test]
    fn test_take_clears() {
        LastError::new(42, "boom").set_last();
        assert_eq!(LastError::last_code(), 42);

        let taken = LastError::take_last().unwrap();
        assert_eq!(taken.message(), "boom");
        assert_eq!(LastError::take_last(), None);
    }
}
