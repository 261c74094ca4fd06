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

use std::{
    ffi::{c_char, c_int, CStr},
    ptr::{self, NonNull},
};

use analytics::{settings::get_thread_local_settings, Calculator, OwnedPoint, RawDataPoint, Settings};
use log::{debug, log_enabled, warn, Level};

use crate::{
    error::{Error, Result},
    handle_map::get_handles,
    last_error::LastError,
    macros::{
        cstr_or_return, ok_or_return_int, ok_or_return_null, ok_or_return_zero, ptr_or_return,
    },
    tracking::{get_registry, to_c_string},
};

/// Opaque reference to a calculator. The layout of the calculator itself
/// is never exposed.
pub type CalcHandle = u64;

/// Returned by `calc_create` on failure. Never a live handle.
pub const CALC_NULL_HANDLE: CalcHandle = 0;

/// Mirrors `analytics::SYSTEM_LIMIT`.
pub const ANALYTICS_SYSTEM_LIMIT: c_int = 100;

const _: () = assert!(ANALYTICS_SYSTEM_LIMIT == analytics::SYSTEM_LIMIT);

fn with_calculator<R>(
    handle: CalcHandle,
    f: impl FnOnce(&mut Calculator) -> analytics::Result<R>,
) -> Result<R> {
    if handle == CALC_NULL_HANDLE {
        return Err(Error::NullHandle("handle".to_string()));
    }
    get_handles().with(handle, f)?.map_err(Error::from)
}

/// Returns a version string for logging.
///
/// # Safety
/// The returned value MUST be released by calling calc_free_string
/// and it is no longer valid after that call.
#[no_mangle]
pub extern "C" fn calc_version() -> *mut c_char {
    let version = format!(
        "{}/{} {}/{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        analytics::NAME,
        analytics::VERSION
    );
    to_c_string(version).unwrap_or(ptr::null_mut())
}

/// Returns the last error message, or an empty string if there is none.
///
/// # Safety
/// The returned value MUST be released by calling calc_free_string
/// and it is no longer valid after that call.
#[no_mangle]
pub extern "C" fn calc_error() -> *mut c_char {
    to_c_string(Error::last_message().unwrap_or_default()).unwrap_or(ptr::null_mut())
}

/// Returns the code of the last error, or 0 if there is none.
#[no_mangle]
pub extern "C" fn calc_error_code() -> c_int {
    LastError::last_code()
}

/// Loads settings for the calling thread from a JSON or TOML string.
/// Values not mentioned keep their current setting.
///
/// # Errors
/// Returns -1 if there were errors, otherwise returns 0.
/// The error string can be retrieved by calling calc_error.
///
/// # Safety
/// Reads from NULL-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn calc_load_settings(
    settings: *const c_char,
    format: *const c_char,
) -> c_int {
    ptr_or_return!(settings, -1);
    // settings documents are not names, so they are not held to the name limit
    let settings = CStr::from_ptr(settings).to_string_lossy();
    let format = cstr_or_return!(format, -1);
    ok_or_return_int!(Settings::from_string(&settings, &format));
    0
}

/// Creates a calculator owned by `name`, starting at `start_val`.
///
/// Returns CALC_NULL_HANDLE when the calculator cannot be created. Check
/// for it before any other call; the reason is available from calc_error.
///
/// # Safety
/// Reads from a NULL-terminated C string. The name is copied.
#[no_mangle]
pub unsafe extern "C" fn calc_create(name: *const c_char, start_val: i32) -> CalcHandle {
    let name = cstr_or_return!(name, CALC_NULL_HANDLE);
    let calc = ok_or_return_zero!(Calculator::new(&name, start_val));
    let handle = ok_or_return_zero!(get_handles().insert(calc));
    debug!("created calculator {handle:#x} for {name}");
    handle
}

/// Adds `amount` to the calculator.
///
/// # Errors
/// Returns -1 on overflow (the value is unchanged) or an invalid handle.
#[no_mangle]
pub extern "C" fn calc_add(handle: CalcHandle, amount: i32) -> c_int {
    ok_or_return_int!(with_calculator(handle, |calc| calc.add(amount)));
    0
}

/// Subtracts `amount` from the calculator.
///
/// # Errors
/// Returns -1 on overflow (the value is unchanged) or an invalid handle.
#[no_mangle]
pub extern "C" fn calc_subtract(handle: CalcHandle, amount: i32) -> c_int {
    ok_or_return_int!(with_calculator(handle, |calc| calc.subtract(amount)));
    0
}

/// Multiplies the calculator value by `factor`.
///
/// # Errors
/// Returns -1 on overflow (the value is unchanged) or an invalid handle.
#[no_mangle]
pub extern "C" fn calc_multiply(handle: CalcHandle, factor: i32) -> c_int {
    ok_or_return_int!(with_calculator(handle, |calc| calc.multiply(factor)));
    0
}

/// Writes the current value to `out`.
///
/// # Safety
/// `out` must be valid for a write of one `int32_t`.
#[no_mangle]
pub unsafe extern "C" fn calc_value(handle: CalcHandle, out: *mut i32) -> c_int {
    ptr_or_return!(out, -1);
    let value = ok_or_return_int!(with_calculator(handle, |calc| Ok(calc.value())));
    *out = value;
    0
}

/// Returns a new string describing the calculator, including its value.
///
/// The string is independent of the handle: releasing one never affects
/// the other.
///
/// # Safety
/// The returned value MUST be released by calling calc_free_string
/// and it is no longer valid after that call.
#[no_mangle]
pub extern "C" fn calc_get_summary(handle: CalcHandle) -> *mut c_char {
    let summary = ok_or_return_null!(with_calculator(handle, |calc| Ok(calc.summary())));
    ok_or_return_null!(to_c_string(summary))
}

/// Frees a string allocated by this library. NULL is ignored.
///
/// # Safety
/// The string must not have been modified in C.
/// The string can only be freed once and is invalid after this call.
/// Freeing it twice is a contract violation. Detection is by address: if
/// the address has already been reused for a new string, the second free
/// releases that string instead of being flagged.
#[no_mangle]
pub extern "C" fn calc_free_string(s: *mut c_char) {
    if let Err(err) = get_registry().free(s) {
        err.set_last();
    }
}

/// Destroys a calculator. CALC_NULL_HANDLE is ignored.
///
/// # Safety
/// The handle is invalid after this call. Using it again, including a
/// second calc_destroy, is a contract violation.
#[no_mangle]
pub extern "C" fn calc_destroy(handle: CalcHandle) {
    if handle == CALC_NULL_HANDLE {
        return;
    }
    match get_handles().remove::<Calculator>(handle) {
        Ok(calc) => debug!("destroyed calculator {handle:#x} for {}", calc.owner()),
        Err(err) => err.set_last(),
    }
}

/// Number of calculators created and not yet destroyed.
#[no_mangle]
pub extern "C" fn calc_live_handles() -> usize {
    get_handles().len()
}

/// Number of strings and heap points issued and not yet freed.
#[no_mangle]
pub extern "C" fn calc_live_allocations() -> usize {
    get_registry().len()
}

/// Logs a warning for every kind of resource still live and returns how
/// many there are in total. Intended to be called right before shutdown.
#[no_mangle]
pub extern "C" fn calc_report_leaks() -> usize {
    let handles = get_handles().len();
    let allocations = get_registry().len();

    if get_thread_local_settings().violations.report_leaks {
        if handles > 0 {
            warn!("{handles} calculator handle(s) were not destroyed; call calc_destroy exactly once per handle");
        }
        if allocations > 0 {
            warn!("{allocations} allocation(s) were not freed; release strings with calc_free_string and points with analytics_free_heap_point");
        }
    }
    handles + allocations
}

/// Returns ANALYTICS_SYSTEM_LIMIT.
#[no_mangle]
pub extern "C" fn analytics_system_limit() -> c_int {
    analytics::SYSTEM_LIMIT
}

/// Euclidean distance of `point` from the origin. NaN and infinities
/// propagate.
///
/// # Safety
/// `point.label` must be NULL or a valid NULL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn analytics_calculate_distance(point: RawDataPoint) -> f32 {
    if log_enabled!(Level::Debug) && !point.label.is_null() {
        debug!(
            "point label: {}",
            CStr::from_ptr(point.label).to_string_lossy()
        );
    }
    point.distance_from_origin()
}

/// Allocates a point on the heap.
///
/// Returns NULL if `label` is NULL or the allocation fails; the reason is
/// available from calc_error.
///
/// # Safety
/// `label` is borrowed, not copied: it must stay valid until the point is
/// freed. The returned value MUST be released by calling
/// analytics_free_heap_point.
#[no_mangle]
pub unsafe extern "C" fn analytics_create_heap_point(
    x: f32,
    y: f32,
    label: *const c_char,
) -> *mut RawDataPoint {
    ptr_or_return!(label, ptr::null_mut());
    let point = ok_or_return_null!(OwnedPoint::new(x, y, CStr::from_ptr(label)));

    let raw = point.into_raw().as_ptr();
    let addr = raw as usize;
    ok_or_return_null!(get_registry().track(raw, move || {
        if let Some(ptr) = NonNull::new(addr as *mut RawDataPoint) {
            // SAFETY: ptr came from into_raw above and the registry runs
            // this cleanup at most once.
            drop(unsafe { OwnedPoint::from_raw(ptr) });
        }
    }))
}

/// Frees a point allocated by analytics_create_heap_point. NULL is ignored.
///
/// # Safety
/// The point can only be freed once and is invalid after this call.
/// Freeing it twice is a contract violation. Detection is by address: if
/// the address has already been reused for a new point, the second free
/// releases that point instead of being flagged.
#[no_mangle]
pub extern "C" fn analytics_free_heap_point(point: *mut RawDataPoint) {
    if let Err(err) = get_registry().free(point) {
        err.set_last();
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;

    use super::*;

    fn report_violations() {
        Settings::set_thread_local_value("violations.policy", "report").unwrap();
    }

    fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_owned();
        calc_free_string(ptr);
        s
    }

    fn last_error() -> String {
        take_string(calc_error())
    }

    fn create(name: &str, start: i32) -> CalcHandle {
        let name = CString::new(name).unwrap();
        unsafe { calc_create(name.as_ptr(), start) }
    }

    #[test]
    fn test_calculator_lifecycle() {
        let _serial = crate::serial_guard();
        let handle = create("Renzo's Calc", 500);
        assert_ne!(handle, CALC_NULL_HANDLE);

        assert_eq!(calc_add(handle, 50), 0);
        let summary = take_string(calc_get_summary(handle));
        assert_eq!(summary, "Owner: Renzo's Calc, Value: 550");

        calc_destroy(handle);
        assert!(!get_handles().contains(handle));
    }

    #[test]
    fn test_summary_release_keeps_handle() {
        let _serial = crate::serial_guard();
        let handle = create("independent", 1);
        let summary = calc_get_summary(handle);
        calc_free_string(summary);

        assert_eq!(calc_add(handle, 1), 0);
        let mut value = 0;
        assert_eq!(unsafe { calc_value(handle, &mut value) }, 0);
        assert_eq!(value, 2);
        calc_destroy(handle);
    }

    #[test]
    fn test_summary_outlives_handle() {
        let _serial = crate::serial_guard();
        let handle = create("short lived", 9);
        let summary = calc_get_summary(handle);
        calc_destroy(handle);

        assert_eq!(take_string(summary), "Owner: short lived, Value: 9");
    }

    #[test]
    fn test_arithmetic_and_overflow() {
        let _serial = crate::serial_guard();
        let handle = create("math", 6);
        assert_eq!(calc_subtract(handle, 2), 0);
        assert_eq!(calc_multiply(handle, 5), 0);

        assert_eq!(calc_add(handle, i32::MAX), -1);
        assert_eq!(calc_error_code(), 102);
        assert!(last_error().starts_with("Overflow: "));

        let mut value = 0;
        unsafe { calc_value(handle, &mut value) };
        assert_eq!(value, 20);
        calc_destroy(handle);
    }

    #[test]
    fn test_create_null_name() {
        let _serial = crate::serial_guard();
        let handle = unsafe { calc_create(ptr::null(), 1) };
        assert_eq!(handle, CALC_NULL_HANDLE);
        assert_eq!(last_error(), "NullParameter: name");
    }

    #[test]
    fn test_create_name_too_long() {
        let _serial = crate::serial_guard();
        Settings::set_thread_local_value("limits.max_name_len", 3).unwrap();
        assert_eq!(create("four", 0), CALC_NULL_HANDLE);
        assert_eq!(last_error(), "StringTooLong: name exceeds 3 bytes");
        Settings::reset().unwrap();
    }

    #[test]
    fn test_use_after_destroy_is_flagged() {
        let _serial = crate::serial_guard();
        report_violations();
        let handle = create("doomed", 0);
        calc_destroy(handle);

        assert_eq!(calc_add(handle, 1), -1);
        assert_eq!(calc_error_code(), 11);
        assert!(calc_get_summary(handle).is_null());
        assert!(last_error().starts_with("StaleHandle: "));

        calc_destroy(handle);
        assert_eq!(calc_error_code(), 11);
        Settings::reset().unwrap();
    }

    #[test]
    fn test_null_handle_is_flagged() {
        let _serial = crate::serial_guard();
        report_violations();
        assert_eq!(calc_add(CALC_NULL_HANDLE, 1), -1);
        assert_eq!(last_error(), "NullHandle: handle");

        // destroying the null handle is a no-op, like free(NULL)
        LastError::take_last();
        calc_destroy(CALC_NULL_HANDLE);
        assert_eq!(calc_error_code(), 0);
        Settings::reset().unwrap();
    }

    #[test]
    fn test_double_free_string_is_flagged() {
        let _serial = crate::serial_guard();
        report_violations();
        let version = calc_version();
        calc_free_string(version);
        calc_free_string(version);
        assert_eq!(calc_error_code(), 13);

        LastError::take_last();
        calc_free_string(ptr::null_mut());
        assert_eq!(calc_error_code(), 0);
        Settings::reset().unwrap();
    }

    #[test]
    fn test_load_settings() {
        let _serial = crate::serial_guard();
        let settings = CString::new("[violations]\npolicy = \"report\"").unwrap();
        let format = CString::new("toml").unwrap();
        assert_eq!(
            unsafe { calc_load_settings(settings.as_ptr(), format.as_ptr()) },
            0
        );
        assert_eq!(
            get_thread_local_settings().violations.policy,
            analytics::settings::ViolationPolicy::Report
        );

        let format = CString::new("ini").unwrap();
        assert_eq!(
            unsafe { calc_load_settings(settings.as_ptr(), format.as_ptr()) },
            -1
        );
        assert_eq!(calc_error_code(), 103);
        Settings::reset().unwrap();
    }

    #[test]
    fn test_version() {
        let _serial = crate::serial_guard();
        let version = take_string(calc_version());
        assert!(version.starts_with("rust_core_ffi/"));
        assert!(version.contains("analytics/"));
    }

    #[test]
    fn test_distance() {
        let label = CString::new("corner").unwrap();
        let point = RawDataPoint {
            x: 3.0,
            y: 4.0,
            label: label.as_ptr(),
        };
        assert_eq!(unsafe { analytics_calculate_distance(point) }, 5.0);

        let origin = RawDataPoint {
            x: 0.0,
            y: 0.0,
            label: ptr::null(),
        };
        assert_eq!(unsafe { analytics_calculate_distance(origin) }, 0.0);
    }

    #[test]
    fn test_heap_point_lifecycle() {
        let _serial = crate::serial_guard();
        let label = CString::new("heap").unwrap();
        let point = unsafe { analytics_create_heap_point(6.0, 8.0, label.as_ptr()) };
        assert!(!point.is_null());
        assert!(get_registry().is_tracked(point as *const ()));

        let raw = unsafe { *point };
        assert_eq!(raw.label, label.as_ptr());
        assert_eq!(unsafe { analytics_calculate_distance(raw) }, 10.0);

        analytics_free_heap_point(point);
        assert!(!get_registry().is_tracked(point as *const ()));
    }

    #[test]
    fn test_heap_point_double_free_is_flagged() {
        let _serial = crate::serial_guard();
        report_violations();
        let label = CString::new("twice").unwrap();
        let point = unsafe { analytics_create_heap_point(1.0, 1.0, label.as_ptr()) };
        analytics_free_heap_point(point);
        analytics_free_heap_point(point);
        assert_eq!(calc_error_code(), 13);

        LastError::take_last();
        analytics_free_heap_point(ptr::null_mut());
        assert_eq!(calc_error_code(), 0);
        Settings::reset().unwrap();
    }

    #[test]
    fn test_string_is_not_a_point() {
        let _serial = crate::serial_guard();
        report_violations();
        let version = calc_version();
        analytics_free_heap_point(version as *mut RawDataPoint);
        assert_eq!(calc_error_code(), 14);

        // still owned by the caller as a string
        calc_free_string(version);
        Settings::reset().unwrap();
    }

    #[test]
    fn test_heap_point_null_label() {
        let _serial = crate::serial_guard();
        let point = unsafe { analytics_create_heap_point(1.0, 2.0, ptr::null()) };
        assert!(point.is_null());
        assert_eq!(last_error(), "NullParameter: label");
    }

    #[test]
    fn test_system_limit() {
        assert_eq!(analytics_system_limit(), ANALYTICS_SYSTEM_LIMIT);
    }
}
