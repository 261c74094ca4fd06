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

use std::fmt;

use crate::{settings::get_thread_local_settings, Error, Result};

/// A named running total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Calculator {
    owner: String,
    current_value: i32,
}

impl Calculator {
    /// Creates a calculator owned by `owner`, starting at `start_val`.
    ///
    /// The owner name is copied. Names longer than `limits.max_name_len`
    /// are rejected with [`Error::InvalidName`], and a failed copy is
    /// reported as [`Error::Allocation`].
    pub fn new(owner: &str, start_val: i32) -> Result<Self> {
        let max_name_len = get_thread_local_settings().limits.max_name_len;
        if owner.len() > max_name_len {
            return Err(Error::InvalidName(format!(
                "owner name is {} bytes, limit is {max_name_len}",
                owner.len()
            )));
        }

        let mut name = String::new();
        name.try_reserve_exact(owner.len())
            .map_err(|_| Error::Allocation { size: owner.len() })?;
        name.push_str(owner);

        Ok(Self {
            owner: name,
            current_value: start_val,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn value(&self) -> i32 {
        self.current_value
    }

    /// Adds `amount`, returning the new value.
    pub fn add(&mut self, amount: i32) -> Result<i32> {
        self.apply("add", amount, i32::checked_add)
    }

    /// Subtracts `amount`, returning the new value.
    pub fn subtract(&mut self, amount: i32) -> Result<i32> {
        self.apply("subtract", amount, i32::checked_sub)
    }

    /// Multiplies by `factor`, returning the new value.
    pub fn multiply(&mut self, factor: i32) -> Result<i32> {
        self.apply("multiply", factor, i32::checked_mul)
    }

    /// `"Owner: <owner>, Value: <value>"`
    pub fn summary(&self) -> String {
        self.to_string()
    }

    // the value is left untouched when the operation overflows
    fn apply(&mut self, op: &'static str, rhs: i32, f: fn(i32, i32) -> Option<i32>) -> Result<i32> {
        let lhs = self.current_value;
        self.current_value = f(lhs, rhs).ok_or(Error::Overflow { op, lhs, rhs })?;
        Ok(self.current_value)
    }
}

impl fmt::Display for Calculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Owner: {}, Value: {}", self.owner, self.current_value)
    }
}
