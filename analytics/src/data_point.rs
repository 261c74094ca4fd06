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
    alloc::{alloc, dealloc, Layout},
    ffi::{c_char, CStr},
    fmt,
    marker::PhantomData,
    ptr::NonNull,
};

use log::debug;

use crate::{Error, Result};

/// Upper bound shared with C callers as `ANALYTICS_SYSTEM_LIMIT`.
pub const SYSTEM_LIMIT: i32 = 100;

/// A labeled point in the plane.
///
/// The label is borrowed, never copied: a `DataPoint` cannot outlive the
/// string it was built from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DataPoint<'a> {
    pub x: f32,
    pub y: f32,
    pub label: &'a str,
}

impl<'a> DataPoint<'a> {
    pub fn new(x: f32, y: f32, label: &'a str) -> Self {
        Self { x, y, label }
    }

    /// Euclidean distance from `(0, 0)`.
    ///
    /// NaN and infinite coordinates propagate through the result unchanged.
    pub fn distance_from_origin(&self) -> f32 {
        debug!("point label: {}", self.label);
        hypot(self.x, self.y)
    }
}

/// Free-function form of [`DataPoint::distance_from_origin`].
pub fn distance_from_origin(point: &DataPoint<'_>) -> f32 {
    point.distance_from_origin()
}

fn hypot(x: f32, y: f32) -> f32 {
    (x * x + y * y).sqrt()
}

/// The C layout of a data point, published to C as `DataPoint`.
///
/// `label` is a borrowed, NUL-terminated string owned by whoever built the
/// struct. Nothing in this crate frees it.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawDataPoint {
    pub x: f32,
    pub y: f32,
    pub label: *const c_char,
}

impl RawDataPoint {
    /// Euclidean distance from `(0, 0)`. Does not read `label`.
    pub fn distance_from_origin(&self) -> f32 {
        hypot(self.x, self.y)
    }
}

type AllocFn = unsafe fn(Layout) -> *mut u8;

/// A heap allocated [`RawDataPoint`] with exactly one owner.
///
/// The allocation is released when the value is dropped, so it can be
/// neither freed twice nor used after release. The label is still borrowed
/// for `'a`.
pub struct OwnedPoint<'a> {
    ptr: NonNull<RawDataPoint>,
    _label: PhantomData<&'a CStr>,
}

impl<'a> OwnedPoint<'a> {
    /// Allocates a point on the heap.
    ///
    /// Returns [`Error::Allocation`] if the allocator cannot satisfy the
    /// request.
    pub fn new(x: f32, y: f32, label: &'a CStr) -> Result<Self> {
        Self::new_with(x, y, label, alloc)
    }

    fn new_with(x: f32, y: f32, label: &'a CStr, alloc_fn: AllocFn) -> Result<Self> {
        let layout = Layout::new::<RawDataPoint>();
        // SAFETY: RawDataPoint is not zero sized.
        let raw = unsafe { alloc_fn(layout) } as *mut RawDataPoint;
        let ptr = NonNull::new(raw).ok_or(Error::Allocation {
            size: layout.size(),
        })?;

        // SAFETY: ptr is freshly allocated with the layout of RawDataPoint.
        unsafe {
            ptr.as_ptr().write(RawDataPoint {
                x,
                y,
                label: label.as_ptr(),
            })
        };

        debug!("allocated point at {:p}", ptr);
        Ok(Self {
            ptr,
            _label: PhantomData,
        })
    }

    pub fn x(&self) -> f32 {
        self.raw().x
    }

    pub fn y(&self) -> f32 {
        self.raw().y
    }

    pub fn label(&self) -> &'a CStr {
        // SAFETY: label was taken from a &'a CStr in new_with.
        unsafe { CStr::from_ptr(self.raw().label) }
    }

    pub fn distance_from_origin(&self) -> f32 {
        debug!("point label: {}", self.label().to_string_lossy());
        self.raw().distance_from_origin()
    }

    /// Releases the allocation now instead of at the end of scope.
    pub fn release(self) {
        drop(self)
    }

    /// Gives up ownership, returning the raw allocation.
    ///
    /// The pointer must eventually be passed back to [`OwnedPoint::from_raw`].
    pub fn into_raw(self) -> NonNull<RawDataPoint> {
        let ptr = self.ptr;
        std::mem::forget(self);
        ptr
    }

    /// Takes back ownership of a pointer produced by [`OwnedPoint::into_raw`].
    ///
    /// # Safety
    /// `ptr` must come from `into_raw`, must not have been reclaimed before,
    /// and its label must still be valid for `'a`.
    pub unsafe fn from_raw(ptr: NonNull<RawDataPoint>) -> Self {
        Self {
            ptr,
            _label: PhantomData,
        }
    }

    fn raw(&self) -> &RawDataPoint {
        // SAFETY: ptr stays valid and initialized for the life of self.
        unsafe { self.ptr.as_ref() }
    }
}

impl Drop for OwnedPoint<'_> {
    fn drop(&mut self) {
        debug!("freeing point at {:p}", self.ptr);
        // SAFETY: ptr was allocated in new_with with this layout and is only
        // released here.
        unsafe { dealloc(self.ptr.as_ptr() as *mut u8, Layout::new::<RawDataPoint>()) };
    }
}

impl fmt::Debug for OwnedPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedPoint")
            .field("x", &self.x())
            .field("y", &self.y())
            .field("label", &self.label())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::ptr::null_mut;

    use super::*;

    unsafe fn exhausted(_layout: Layout) -> *mut u8 {
        null_mut()
    }

    #[test]
    fn test_three_four_five() {
        let point = DataPoint::new(3.0, 4.0, "pythagoras");
        assert_eq!(point.distance_from_origin(), 5.0);
    }

    #[test]
    fn test_origin() {
        let point = DataPoint::new(0.0, 0.0, "origin");
        assert_eq!(distance_from_origin(&point), 0.0);
    }

    #[test]
    fn test_matches_formula() {
        let samples = [
            (1.5_f32, -2.25_f32),
            (-7.0, 24.0),
            (1e-3, 1e-3),
            (123.456, 0.0),
            (-0.5, -0.5),
        ];

        for (x, y) in samples {
            let expected = (x * x + y * y).sqrt();
            let actual = DataPoint::new(x, y, "sample").distance_from_origin();
            assert!(
                (actual - expected).abs() <= f32::EPSILON * expected.max(1.0),
                "({x}, {y}): {actual} != {expected}"
            );
        }
    }

    #[test]
    fn test_non_finite_propagates() {
        assert!(DataPoint::new(f32::NAN, 1.0, "nan")
            .distance_from_origin()
            .is_nan());
        assert_eq!(
            DataPoint::new(f32::INFINITY, 1.0, "inf").distance_from_origin(),
            f32::INFINITY
        );
    }

    #[test]
    fn test_owned_point_fields() {
        let label = c"heap";
        let point = OwnedPoint::new(6.0, 8.0, label).unwrap();
        assert_eq!(point.x(), 6.0);
        assert_eq!(point.y(), 8.0);
        assert_eq!(point.label(), label);
        assert_eq!(point.distance_from_origin(), 10.0);
        point.release();
    }

    #[test]
    fn test_owned_point_label_is_borrowed() {
        let label = c"borrowed";
        let point = OwnedPoint::new(1.0, 1.0, label).unwrap();
        assert_eq!(point.label().as_ptr(), label.as_ptr());
    }

    #[test]
    fn test_allocation_failure_is_reported() {
        let err = OwnedPoint::new_with(1.0, 2.0, c"oom", exhausted).unwrap_err();
        assert_eq!(
            err,
            Error::Allocation {
                size: std::mem::size_of::<RawDataPoint>()
            }
        );
    }

    #[test]
    fn test_raw_round_trip_keeps_single_owner() {
        let point = OwnedPoint::new(3.0, 4.0, c"raw").unwrap();
        let raw = point.into_raw();
        assert_eq!(unsafe { raw.as_ref() }.distance_from_origin(), 5.0);

        let point = unsafe { OwnedPoint::from_raw(raw) };
        assert_eq!(point.x(), 3.0);
    }
}
