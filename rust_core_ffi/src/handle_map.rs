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

//! Generation-checked handles.
//!
//! Rust objects handed to C are stored in a global slot table and C only
//! ever sees a 64-bit handle. The low 32 bits select a slot and the high 32
//! bits carry the slot's generation at insertion time. Removing a value
//! bumps the generation, so a destroyed handle never matches again, even
//! after its slot has been reused.

use std::{
    any::Any,
    sync::{Mutex, MutexGuard, OnceLock},
};

use analytics::Error as AnalyticsError;
use log::warn;

use crate::error::{Error, Result};

pub type Handle = u64;

/// Never issued: slot generations start at 1.
pub const NULL_HANDLE: Handle = 0;

struct Slot {
    generation: u32,
    value: Option<Box<dyn Any + Send>>,
}

#[derive(Default)]
struct Slots {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl Slots {
    fn lookup(&mut self, handle: Handle) -> Result<&mut Slot> {
        let (index, generation) = split(handle);
        self.slots
            .get_mut(index as usize)
            .filter(|slot| slot.generation == generation && slot.value.is_some())
            .ok_or(Error::StaleHandle(handle))
    }
}

fn join(index: u32, generation: u32) -> Handle {
    (u64::from(generation) << 32) | u64::from(index)
}

fn split(handle: Handle) -> (u32, u32) {
    (handle as u32, (handle >> 32) as u32)
}

fn allocation_error<T>() -> Error {
    Error::from(AnalyticsError::Allocation {
        size: std::mem::size_of::<T>(),
    })
}

pub struct HandleMap {
    inner: Mutex<Slots>,
}

impl HandleMap {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Slots::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("handle map mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Insert a value and return its handle.
    ///
    /// Growing the slot table can fail; that is reported as an allocation
    /// error and nothing is inserted.
    pub fn insert<T: Any + Send>(&self, value: T) -> Result<Handle> {
        let mut inner = self.lock();

        if let Some(index) = inner.free.pop() {
            let slot = &mut inner.slots[index as usize];
            slot.value = Some(Box::new(value));
            let generation = slot.generation;
            inner.live += 1;
            return Ok(join(index, generation));
        }

        let index = u32::try_from(inner.slots.len()).map_err(|_| allocation_error::<Slot>())?;
        inner
            .slots
            .try_reserve(1)
            .map_err(|_| allocation_error::<Slot>())?;
        // reserve the free list too so remove never allocates
        inner
            .free
            .try_reserve(1)
            .map_err(|_| allocation_error::<u32>())?;

        inner.slots.push(Slot {
            generation: 1,
            value: Some(Box::new(value)),
        });
        inner.live += 1;
        Ok(join(index, 1))
    }

    /// Run `f` against the live value behind `handle`.
    ///
    /// The map stays locked while `f` runs, so `f` must not call back into
    /// the handle map.
    pub fn with<T: Any, R>(&self, handle: Handle, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut inner = self.lock();
        let slot = inner.lookup(handle)?;
        let value = slot
            .value
            .as_mut()
            .and_then(|v| v.downcast_mut::<T>())
            .ok_or(Error::WrongHandleType(handle))?;
        Ok(f(value))
    }

    /// Remove and return a value, invalidating `handle`.
    ///
    /// A handle of the wrong type is left in place.
    pub fn remove<T: Any>(&self, handle: Handle) -> Result<T> {
        let mut inner = self.lock();
        let slot = inner.lookup(handle)?;
        if !slot.value.as_ref().is_some_and(|v| v.is::<T>()) {
            return Err(Error::WrongHandleType(handle));
        }

        let value = slot.value.take().ok_or(Error::StaleHandle(handle))?;
        // a slot whose generation would wrap is retired for good
        let reusable = match slot.generation.checked_add(1) {
            Some(next) => {
                slot.generation = next;
                true
            }
            None => false,
        };

        let (index, _) = split(handle);
        if reusable {
            inner.free.push(index);
        }
        inner.live -= 1;
        drop(inner);

        value
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| Error::WrongHandleType(handle))
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.lock().lookup(handle).is_ok()
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The process-wide handle map.
pub fn get_handles() -> &'static HandleMap {
    static HANDLES: OnceLock<HandleMap> = OnceLock::new();
    HANDLES.get_or_init(HandleMap::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_with_remove() {
        let map = HandleMap::new();
        let handle = map.insert(41_i32).unwrap();
        assert_ne!(handle, NULL_HANDLE);

        let value = map
            .with(handle, |v: &mut i32| {
                *v += 1;
                *v
            })
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(map.remove::<i32>(handle).unwrap(), 42);
        assert!(map.is_empty());
    }

    #[test]
    fn test_removed_handle_is_stale() {
        let map = HandleMap::new();
        let handle = map.insert(String::from("gone")).unwrap();
        map.remove::<String>(handle).unwrap();

        assert!(matches!(
            map.with(handle, |_: &mut String| ()),
            Err(Error::StaleHandle(h)) if h == handle
        ));
        assert!(matches!(
            map.remove::<String>(handle),
            Err(Error::StaleHandle(_))
        ));
    }

    #[test]
    fn test_reused_slot_rejects_old_generation() {
        let map = HandleMap::new();
        let first = map.insert(1_u8).unwrap();
        map.remove::<u8>(first).unwrap();

        let second = map.insert(2_u8).unwrap();
        assert_eq!(split(first).0, split(second).0);
        assert_ne!(first, second);

        assert!(!map.contains(first));
        assert!(map.contains(second));
        assert!(map.remove::<u8>(first).is_err());
        assert_eq!(map.remove::<u8>(second).unwrap(), 2);
    }

    #[test]
    fn test_wrong_type_leaves_value() {
        let map = HandleMap::new();
        let handle = map.insert(7_i64).unwrap();

        assert!(matches!(
            map.remove::<String>(handle),
            Err(Error::WrongHandleType(_))
        ));
        assert!(matches!(
            map.with(handle, |_: &mut u32| ()),
            Err(Error::WrongHandleType(_))
        ));
        assert_eq!(map.remove::<i64>(handle).unwrap(), 7);
    }

    #[test]
    fn test_unknown_and_null_handles() {
        let map = HandleMap::new();
        assert!(!map.contains(NULL_HANDLE));
        assert!(matches!(
            map.with(join(99, 1), |_: &mut i32| ()),
            Err(Error::StaleHandle(_))
        ));
    }

    #[test]
    fn test_exhausted_generation_retires_slot() {
        let map = HandleMap::new();
        let handle = map.insert(0_u8).unwrap();
        map.lock().slots[split(handle).0 as usize].generation = u32::MAX;
        let old = join(split(handle).0, u32::MAX);

        map.remove::<u8>(old).unwrap();
        let next = map.insert(1_u8).unwrap();
        assert_ne!(split(next).0, split(old).0);
    }
}
