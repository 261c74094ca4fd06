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

//! Safe wrappers over the C API.
//!
//! These own their C resources and release them on drop, so they can
//! never be released twice.

use std::{
    ffi::{c_char, CStr, CString},
    marker::PhantomData,
    ptr::NonNull,
};

use anyhow::{anyhow, Result};
use log::debug;
use rust_core::{
    analytics_calculate_distance, analytics_create_heap_point, analytics_free_heap_point,
    calc_add, calc_create, calc_destroy, calc_error, calc_free_string, calc_get_summary,
    calc_multiply, calc_subtract, calc_value, CalcHandle, RawDataPoint, CALC_NULL_HANDLE,
};

/// Takes ownership of a library string, copying it out before freeing it.
fn take_string(ptr: *mut c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null strings from the library are NUL-terminated.
    let s = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
    calc_free_string(ptr);
    Some(s)
}

/// The last error on this thread as an [anyhow::Error].
pub fn last_error() -> anyhow::Error {
    match take_string(calc_error()) {
        Some(message) if !message.is_empty() => anyhow!(message),
        _ => anyhow!("unknown error"),
    }
}

fn check(status: i32) -> Result<()> {
    match status {
        0 => Ok(()),
        _ => Err(last_error()),
    }
}

/// A calculator held through an opaque handle.
#[derive(Debug)]
pub struct CalcClient {
    handle: CalcHandle,
}

impl CalcClient {
    pub fn new(name: &str, start: i32) -> Result<Self> {
        let name = CString::new(name)?;
        // SAFETY: name is a valid C string for the duration of the call.
        let handle = unsafe { calc_create(name.as_ptr(), start) };
        if handle == CALC_NULL_HANDLE {
            return Err(last_error());
        }
        debug!("calculator handle {handle:#x}");
        Ok(Self { handle })
    }

    pub fn add(&mut self, amount: i32) -> Result<()> {
        check(calc_add(self.handle, amount))
    }

    pub fn subtract(&mut self, amount: i32) -> Result<()> {
        check(calc_subtract(self.handle, amount))
    }

    pub fn multiply(&mut self, factor: i32) -> Result<()> {
        check(calc_multiply(self.handle, factor))
    }

    pub fn value(&self) -> Result<i32> {
        let mut value = 0;
        // SAFETY: value is a live i32.
        check(unsafe { calc_value(self.handle, &mut value) })?;
        Ok(value)
    }

    pub fn summary(&self) -> Result<String> {
        take_string(calc_get_summary(self.handle)).ok_or_else(last_error)
    }

    /// Gives up ownership of the handle. The caller must destroy it.
    pub fn into_handle(self) -> CalcHandle {
        let handle = self.handle;
        std::mem::forget(self);
        handle
    }
}

impl Drop for CalcClient {
    fn drop(&mut self) {
        calc_destroy(self.handle);
    }
}

/// A point allocated by the library. Borrows its label, which must
/// outlive it.
#[derive(Debug)]
pub struct HeapPoint<'a> {
    ptr: NonNull<RawDataPoint>,
    _label: PhantomData<&'a CStr>,
}

impl<'a> HeapPoint<'a> {
    pub fn new(x: f32, y: f32, label: &'a CStr) -> Result<Self> {
        // SAFETY: label is borrowed for 'a, which outlives the point.
        let ptr = unsafe { analytics_create_heap_point(x, y, label.as_ptr()) };
        let ptr = NonNull::new(ptr).ok_or_else(last_error)?;
        Ok(Self {
            ptr,
            _label: PhantomData,
        })
    }

    pub fn x(&self) -> f32 {
        // SAFETY: the point is live until drop.
        unsafe { self.ptr.as_ref() }.x
    }

    pub fn y(&self) -> f32 {
        // SAFETY: the point is live until drop.
        unsafe { self.ptr.as_ref() }.y
    }

    pub fn distance(&self) -> f32 {
        // SAFETY: the point and its label are live until drop.
        unsafe { analytics_calculate_distance(*self.ptr.as_ref()) }
    }
}

impl Drop for HeapPoint<'_> {
    fn drop(&mut self) {
        debug!("freeing heap point");
        analytics_free_heap_point(self.ptr.as_ptr());
    }
}

/// Distance of a point that lives on the stack for the duration of the
/// call.
pub fn stack_distance(x: f32, y: f32, label: &CStr) -> f32 {
    let point = RawDataPoint {
        x,
        y,
        label: label.as_ptr(),
    };
    // SAFETY: label outlives the call.
    unsafe { analytics_calculate_distance(point) }
}
