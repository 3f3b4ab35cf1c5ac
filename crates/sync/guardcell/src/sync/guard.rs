//! Scoped access guards handed out by [`GuardedCell`].

use core::fmt;
use core::mem;
use core::ops::{Deref, DerefMut};

use super::GuardedCell;

/// The access right a lease currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AccessMode {
    /// Read/write access; no other lease exists.
    Exclusive,
    /// Read-only access, possibly alongside other shared leases.
    Shared,
    /// The right has been handed back to the cell.
    Released,
}

/// A lease on a cell's access rights.
///
/// Owns nothing: the value belongs to the cell. Dropping the lease hands
/// the right back exactly once.
struct Lease<'a, T> {
    cell: &'a GuardedCell<T>,
    mode: AccessMode,
}

impl<T> Lease<'_, T> {
    /// Hands the access right back to the cell.
    ///
    /// The mode is cleared before the callback, so a second call (including
    /// the one from `Drop`) does nothing.
    fn release(&mut self) {
        let mode = mem::replace(&mut self.mode, AccessMode::Released);
        self.cell.release(mode);
    }
}

impl<T> Drop for Lease<'_, T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// RAII guard granting exclusive (read/write) access to a [`GuardedCell`].
///
/// Returned by [`GuardedCell::lock`] and [`GuardedCell::try_lock`]. While it
/// lives, no other guard of either kind exists for the same cell.
#[must_use = "if unused the cell will immediately unlock"]
pub struct ExclusiveGuard<'a, T> {
    lease: Lease<'a, T>,
}

impl<'a, T> ExclusiveGuard<'a, T> {
    /// Wraps an exclusive acquisition that the caller has already made.
    pub(crate) fn new(cell: &'a GuardedCell<T>) -> Self {
        Self {
            lease: Lease {
                cell,
                mode: AccessMode::Exclusive,
            },
        }
    }

    /// Releases the lock before the end of the guard's scope.
    pub fn release(mut self) {
        self.lease.release();
    }

    /// Returns the cell this guard was issued by.
    pub fn cell(&self) -> &'a GuardedCell<T> {
        self.lease.cell
    }
}

impl<T> Deref for ExclusiveGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        debug_assert_eq!(self.lease.mode, AccessMode::Exclusive);
        // SAFETY: The exclusive lock is held; no other guard can exist.
        unsafe { &*self.lease.cell.value_const_ptr() }
    }
}

impl<T> DerefMut for ExclusiveGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        debug_assert_eq!(self.lease.mode, AccessMode::Exclusive);
        // SAFETY: The exclusive lock is held; no other guard can exist.
        unsafe { &mut *self.lease.cell.value_ptr() }
    }
}

impl<T: fmt::Debug> fmt::Debug for ExclusiveGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: fmt::Display> fmt::Display for ExclusiveGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

/// RAII guard granting shared (read-only) access to a [`GuardedCell`].
///
/// Returned by [`GuardedCell::peek`] and [`GuardedCell::try_peek`]. Any
/// number of shared guards may coexist; none coexists with an
/// [`ExclusiveGuard`].
#[must_use = "if unused the cell will immediately unlock"]
pub struct SharedGuard<'a, T> {
    lease: Lease<'a, T>,
}

impl<'a, T> SharedGuard<'a, T> {
    /// Wraps a shared acquisition that the caller has already recorded.
    pub(crate) fn new(cell: &'a GuardedCell<T>) -> Self {
        Self {
            lease: Lease {
                cell,
                mode: AccessMode::Shared,
            },
        }
    }

    /// Releases this reader's hold before the end of the guard's scope.
    pub fn release(mut self) {
        self.lease.release();
    }

    /// Returns the cell this guard was issued by.
    pub fn cell(&self) -> &'a GuardedCell<T> {
        self.lease.cell
    }
}

impl<T> Deref for SharedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        debug_assert_eq!(self.lease.mode, AccessMode::Shared);
        // SAFETY: The reader group holds the exclusive lock; no writer can exist.
        unsafe { &*self.lease.cell.value_const_ptr() }
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: fmt::Display> fmt::Display for SharedGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

#[cfg(all(test, not(any(loom, shuttle))))]
mod tests {
    use super::*;

    #[test]
    fn lease_release_is_idempotent() {
        let cell = GuardedCell::new(1);
        let guard = cell.lock();
        let mut lease = Lease {
            cell: &cell,
            mode: AccessMode::Exclusive,
        };
        // The guard's own lease must not unlock again.
        mem::forget(guard);
        lease.release();
        assert_eq!(lease.mode, AccessMode::Released);
        lease.release();
        drop(lease);
        assert!(!cell.is_locked());
    }

    #[test]
    fn explicit_release_then_drop() {
        let cell = GuardedCell::new(0);
        let guard = cell.lock();
        guard.release();
        assert!(!cell.is_locked());
        assert!(cell.try_lock().is_some());
    }

    #[test]
    fn shared_release_then_drop_keeps_count() {
        let cell = GuardedCell::new(0);
        let first = cell.peek();
        let second = cell.peek();
        assert_eq!(cell.reader_count(), 2);
        first.release();
        assert_eq!(cell.reader_count(), 1);
        assert!(cell.is_locked());
        drop(second);
        assert_eq!(cell.reader_count(), 0);
        assert!(!cell.is_locked());
    }

    #[test]
    fn guard_reports_its_cell() {
        let cell = GuardedCell::new(3);
        let guard = cell.peek();
        assert!(core::ptr::eq(guard.cell(), &cell));
    }

    #[test]
    fn formatting_forwards_to_value() {
        let cell = GuardedCell::new(String::from("hi"));
        assert_eq!(format!("{:?}", cell.peek()), "\"hi\"");
        assert_eq!(format!("{}", cell.lock()), "hi");
    }
}
