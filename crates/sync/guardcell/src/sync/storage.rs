//! Where a [`GuardedCell`](super::GuardedCell) keeps its value.
//!
//! The set of strategies is closed, so this is a plain enum rather than a
//! trait. Locking and guard code only ever see [`Storage::as_ptr`] and
//! [`Storage::as_const_ptr`]; the variants differ solely in how the value is
//! finalized.

use core::mem::ManuallyDrop;
use core::ptr::{self, NonNull};

use super::loom_compat::UnsafeCell;

/// Storage for the value protected by a cell.
pub(crate) enum Storage<T> {
    /// The value lives inline in the cell; finalizing drops it in place.
    Embedded(UnsafeCell<T>),
    /// The value lives in a separate heap allocation owned by the cell;
    /// finalizing drops the value and frees the allocation.
    ///
    /// The pointer always comes from `Box::into_raw`.
    Owned(NonNull<T>),
}

impl<T> Storage<T> {
    pub(crate) fn embedded(value: T) -> Self {
        Self::Embedded(UnsafeCell::new(value))
    }

    pub(crate) fn owned(boxed: Box<T>) -> Self {
        Self::Owned(NonNull::from(Box::leak(boxed)))
    }

    /// Returns a pointer to the value, whichever variant holds it.
    ///
    /// The pointer is valid for reads and writes for as long as the storage
    /// is neither moved nor dropped. Dereferencing it is subject to the
    /// cell's locking protocol.
    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut T {
        match self {
            Self::Embedded(cell) => cell.get(),
            Self::Owned(ptr) => ptr.as_ptr(),
        }
    }

    /// Like [`as_ptr`](Self::as_ptr), for read-only access.
    #[inline]
    pub(crate) fn as_const_ptr(&self) -> *const T {
        match self {
            Self::Embedded(cell) => cell.get_const(),
            Self::Owned(ptr) => ptr.as_ptr().cast_const(),
        }
    }

    pub(crate) fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded(_))
    }

    /// Consumes the storage and returns the value, freeing any allocation.
    pub(crate) fn into_inner(self) -> T {
        let this = ManuallyDrop::new(self);
        match &*this {
            // SAFETY: `this` is never dropped, so the value is read out
            // exactly once.
            Self::Embedded(cell) => unsafe { ptr::read(cell) }.into_inner(),
            // SAFETY: The pointer came from `Box::into_raw` and ownership is
            // handed back to the box exactly once.
            Self::Owned(ptr) => *unsafe { Box::from_raw(ptr.as_ptr()) },
        }
    }

    /// Consumes the storage and returns the value boxed, reusing the
    /// allocation of the owned variant.
    pub(crate) fn into_box(self) -> Box<T> {
        let this = ManuallyDrop::new(self);
        match &*this {
            // SAFETY: See `into_inner`.
            Self::Embedded(cell) => Box::new(unsafe { ptr::read(cell) }.into_inner()),
            // SAFETY: See `into_inner`.
            Self::Owned(ptr) => unsafe { Box::from_raw(ptr.as_ptr()) },
        }
    }
}

impl<T> Drop for Storage<T> {
    fn drop(&mut self) {
        if let Self::Owned(ptr) = *self {
            // SAFETY: The pointer came from `Box::into_raw` and storage is
            // dropped at most once.
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        }
        // The embedded value is dropped by the compiler-generated glue.
    }
}

#[cfg(all(test, not(any(loom, shuttle))))]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn embedded_access() {
        let storage = Storage::embedded(7u32);
        assert!(storage.is_embedded());
        unsafe { *storage.as_ptr() += 1 };
        assert_eq!(storage.into_inner(), 8);
    }

    #[test]
    fn owned_access() {
        let storage = Storage::owned(Box::new(String::from("boxed")));
        assert!(!storage.is_embedded());
        unsafe { (*storage.as_ptr()).push('!') };
        assert_eq!(storage.into_inner(), "boxed!");
    }

    #[test]
    fn owned_pointer_is_the_original_allocation() {
        let boxed = Box::new(5u64);
        let addr: *const u64 = &*boxed;
        let storage = Storage::owned(boxed);
        assert_eq!(storage.as_ptr().cast_const(), addr);
        assert_eq!(storage.as_const_ptr(), addr);
        let back = storage.into_box();
        assert_eq!(&*back as *const u64, addr);
    }

    #[test]
    fn embedded_into_box() {
        let storage = Storage::embedded(vec![1, 2, 3]);
        assert_eq!(*storage.into_box(), vec![1, 2, 3]);
    }

    #[test]
    fn finalize_drops_exactly_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        drop(Storage::embedded(DropCounter(drops.clone())));
        assert_eq!(drops.load(Ordering::Relaxed), 1);
        drop(Storage::owned(Box::new(DropCounter(drops.clone()))));
        assert_eq!(drops.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn into_inner_does_not_double_drop() {
        let drops = Arc::new(AtomicUsize::new(0));
        let value = Storage::owned(Box::new(DropCounter(drops.clone()))).into_inner();
        assert_eq!(drops.load(Ordering::Relaxed), 0);
        drop(value);
        assert_eq!(drops.load(Ordering::Relaxed), 1);

        let value = Storage::embedded(DropCounter(drops.clone())).into_inner();
        assert_eq!(drops.load(Ordering::Relaxed), 1);
        drop(value);
        assert_eq!(drops.load(Ordering::Relaxed), 2);
    }
}
