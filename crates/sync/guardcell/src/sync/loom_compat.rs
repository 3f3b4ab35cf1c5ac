//! Model-checker compatibility shim.
//!
//! When compiled with `cfg(loom)` or `cfg(shuttle)`, re-exports the model
//! checker's atomics and scheduler hooks. Otherwise, re-exports the standard
//! `core::sync::atomic` types.
//!
//! [`UnsafeCell`] wraps `loom::cell::UnsafeCell` under loom, so every access
//! to a cell's slot and value is checked for data races, and
//! `core::cell::UnsafeCell` otherwise. Callers say whether an access reads
//! ([`get_const`](UnsafeCell::get_const)) or may write
//! ([`get`](UnsafeCell::get)).
//!
//! This allows the cell's bookkeeping to be explored under a deterministic
//! scheduler without code changes. The raw mutex built on top of these lives
//! in [`raw`](super::raw).

// ---------------------------------------------------------------------------
// Loom mode
// ---------------------------------------------------------------------------

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
#[cfg(loom)]
pub(crate) use loom::thread::yield_now;

/// Interior-mutable slot whose accesses loom records.
#[cfg(loom)]
pub(crate) struct UnsafeCell<T>(loom::cell::UnsafeCell<T>);

#[cfg(loom)]
impl<T> UnsafeCell<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(loom::cell::UnsafeCell::new(value))
    }

    /// Records a read and returns a pointer to the contents.
    pub(crate) fn get_const(&self) -> *const T {
        self.0.with(|ptr| ptr)
    }

    /// Records a write and returns a pointer to the contents.
    pub(crate) fn get(&self) -> *mut T {
        self.0.with_mut(|ptr| ptr)
    }

    pub(crate) fn get_mut(&mut self) -> &mut T {
        // SAFETY: `&mut self` excludes every other access.
        unsafe { &mut *self.get() }
    }

    pub(crate) fn into_inner(self) -> T {
        self.0.into_inner()
    }
}

// ---------------------------------------------------------------------------
// Shuttle mode
// ---------------------------------------------------------------------------

#[cfg(all(shuttle, not(loom)))]
pub(crate) use shuttle::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
#[cfg(all(shuttle, not(loom)))]
pub(crate) use shuttle::thread::yield_now;

// ---------------------------------------------------------------------------
// Normal mode
// ---------------------------------------------------------------------------

#[cfg(not(any(loom, shuttle)))]
pub(crate) use core::sync::atomic::{AtomicUsize, Ordering};

/// Interior-mutable slot. Outside loom this is `core::cell::UnsafeCell`.
#[cfg(not(loom))]
#[repr(transparent)]
pub(crate) struct UnsafeCell<T>(core::cell::UnsafeCell<T>);

#[cfg(not(loom))]
impl<T> UnsafeCell<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self(core::cell::UnsafeCell::new(value))
    }

    #[inline]
    pub(crate) fn get_const(&self) -> *const T {
        self.0.get()
    }

    #[inline]
    pub(crate) fn get(&self) -> *mut T {
        self.0.get()
    }

    #[inline]
    pub(crate) fn get_mut(&mut self) -> &mut T {
        self.0.get_mut()
    }

    pub(crate) fn into_inner(self) -> T {
        self.0.into_inner()
    }
}
