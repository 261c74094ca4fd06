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

//! Allocation tracking for raw pointers handed to C.
//!
//! Strings and heap points must be readable from C, so they cross the
//! boundary as real pointers rather than handles. Every such pointer is
//! recorded here with its type and a cleanup function. Freeing looks the
//! pointer up first, which turns a double free or a foreign pointer into a
//! reported error instead of undefined behavior.

use std::{
    any::TypeId,
    collections::HashMap,
    ffi::{c_char, CString},
    sync::{Mutex, MutexGuard, OnceLock},
};

use analytics::Error as AnalyticsError;
use log::warn;

use crate::error::{Error, Result};

type CleanupFn = Box<dyn FnOnce() + Send>;

pub struct PointerRegistry {
    tracked: Mutex<HashMap<usize, (TypeId, CleanupFn)>>,
}

impl PointerRegistry {
    fn new() -> Self {
        Self {
            tracked: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<usize, (TypeId, CleanupFn)>> {
        self.tracked.lock().unwrap_or_else(|poisoned| {
            warn!("pointer registry mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Track `ptr` until it is freed.
    ///
    /// If the registry cannot grow, `cleanup` runs immediately and an
    /// allocation error is returned, so the allocation is never leaked.
    pub fn track<T: 'static>(
        &self,
        ptr: *mut T,
        cleanup: impl FnOnce() + Send + 'static,
    ) -> Result<*mut T> {
        let mut tracked = self.lock();
        if tracked.try_reserve(1).is_err() {
            drop(tracked);
            cleanup();
            return Err(Error::from(AnalyticsError::Allocation {
                size: std::mem::size_of::<(usize, TypeId, CleanupFn)>(),
            }));
        }
        tracked.insert(ptr as usize, (TypeId::of::<T>(), Box::new(cleanup)));
        Ok(ptr)
    }

    /// Free a tracked pointer of type `T` by running its cleanup function.
    ///
    /// NULL is always accepted. An untracked pointer (never issued, or
    /// already freed) and a pointer of another type are errors, and in both
    /// cases nothing is freed.
    pub fn free<T: 'static>(&self, ptr: *mut T) -> Result<()> {
        let addr = ptr as usize;
        if addr == 0 {
            return Ok(());
        }

        let cleanup = {
            let mut tracked = self.lock();
            match tracked.get(&addr) {
                Some((type_id, _)) if *type_id == TypeId::of::<T>() => {}
                Some(_) => return Err(Error::WrongPointerType(addr)),
                None => return Err(Error::UntrackedPointer(addr)),
            }
            tracked.remove(&addr).map(|(_, cleanup)| cleanup)
        };

        // run outside the lock
        if let Some(cleanup) = cleanup {
            cleanup();
        }
        Ok(())
    }

    pub fn is_tracked(&self, ptr: *const ()) -> bool {
        self.lock().contains_key(&(ptr as usize))
    }

    /// Number of pointers issued and not yet freed.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The process-wide pointer registry.
pub fn get_registry() -> &'static PointerRegistry {
    static REGISTRY: OnceLock<PointerRegistry> = OnceLock::new();
    REGISTRY.get_or_init(PointerRegistry::new)
}

/// Converts a Rust String into a tracked C string.
///
/// The result must be released exactly once with `calc_free_string`.
pub fn to_c_string(s: String) -> Result<*mut c_char> {
    let c_str = CString::new(s).map_err(|e| {
        Error::InvalidString(format!("interior NUL at byte {}", e.nul_position()))
    })?;
    let ptr = c_str.into_raw();
    let addr = ptr as usize;
    get_registry().track(ptr, move || {
        // SAFETY: addr came from CString::into_raw above and the registry
        // runs this cleanup at most once.
        drop(unsafe { CString::from_raw(addr as *mut c_char) })
    })
}
