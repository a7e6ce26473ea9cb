//! Debug-only reentrancy guard.
//!
//! Policy functions and value destructors run while a table's links may be
//! transiently inconsistent. Calling back into the same table from there is a
//! programming error; in debug builds entering twice without dropping the
//! guard panics. In release builds the check compiles away.
//!
//! The guard writes nothing into the table. Entered guards are tracked per
//! thread by address, so readers on other threads, mappings or processes
//! never touch the shared bytes. The embedded word only keeps the layout
//! identical across builds and gives every table a distinct guard address.

use core::marker::PhantomData;

#[cfg(debug_assertions)]
use std::cell::RefCell;

#[cfg(debug_assertions)]
std::thread_local! {
    static ENTERED: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Per-table reentrancy tracker. Embedded in the table; public entry points
/// guard themselves with `let _g = self.guard.enter();`.
#[derive(Debug)]
#[repr(C)]
pub struct DebugReentrancy {
    _reserved: u32,
    // Keep !Send + !Sync in line with the externally serialized design.
    _nosend: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    pub const fn new() -> Self {
        Self {
            _reserved: 0,
            _nosend: PhantomData,
        }
    }

    /// Enter a guarded section. In debug builds, panics if this thread has
    /// already entered it.
    #[inline]
    pub fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            let addr = self as *const Self as usize;
            let nested = ENTERED.with(|entered| {
                let mut entered = entered.borrow_mut();
                if entered.contains(&addr) {
                    true
                } else {
                    entered.push(addr);
                    false
                }
            });
            assert!(!nested, "reentrancy detected: nested entry into shared table");
            return ReentrancyGuard {
                addr,
                _z: PhantomData,
            };
        }

        #[cfg(not(debug_assertions))]
        {
            return ReentrancyGuard { _z: PhantomData };
        }
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by `DebugReentrancy::enter`.
pub struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    addr: usize,
    _z: PhantomData<&'a DebugReentrancy>,
}

impl<'a> Drop for ReentrancyGuard<'a> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let addr = self.addr;
            // Thread-local storage may already be gone during thread exit.
            let _ = ENTERED.try_with(|entered| {
                let mut entered = entered.borrow_mut();
                let at = entered.iter().position(|&a| a == addr);
                debug_assert!(at.is_some());
                if let Some(at) = at {
                    entered.swap_remove(at);
                }
            });
        }
    }
}
