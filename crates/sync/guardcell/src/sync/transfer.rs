//! Moving contents between cells.
//!
//! Every transfer holds the exclusive lock of both cells before touching
//! either storage, so no guard on either side can observe a half-finished
//! handover. Storage is moved whole: an owned allocation changes cells
//! without its value being copied.

use core::mem;
use core::ptr;

use super::GuardedCell;
use super::guard::ExclusiveGuard;
use super::storage::Storage;
use crate::error::TransferError;

impl<T> GuardedCell<T> {
    /// Exchanges the contents of two cells.
    ///
    /// Blocks until both cells can be locked exclusively. Swapping a cell
    /// with itself does nothing.
    pub fn swap(&self, other: &Self) {
        if ptr::eq(self, other) {
            return;
        }

        let _held = Self::lock_pair(self, other);
        // SAFETY: Both exclusive locks are held by `_held`, which is not
        // dereferenced while these references are alive.
        unsafe { mem::swap(self.storage_mut(), other.storage_mut()) };

        log::debug!("{}: swapped storage with {}", self.name(), other.name());
    }

    /// Moves the contents of `src` into this cell.
    ///
    /// Blocks until both cells can be locked exclusively. Afterwards this
    /// cell holds `src`'s former storage (and value), and `src` holds
    /// `T::default()`. The previous value of this cell is dropped once both
    /// locks have been released. Transferring from a cell to itself does
    /// nothing.
    ///
    /// The reader count of this cell is left as is: a reader already
    /// waiting in [`peek`](Self::peek) stays registered and sees the new
    /// value once the transfer completes.
    pub fn transfer_from(&self, src: &Self)
    where
        T: Default,
    {
        if ptr::eq(self, src) {
            return;
        }

        let displaced = {
            let held = Self::lock_pair(self, src);
            Self::hand_over(self, src, held)
        };
        drop(displaced);
    }

    /// Moves the contents of `src` into this cell without blocking.
    ///
    /// Fails without modifying either cell if a guard holds either of them.
    /// Otherwise behaves like [`transfer_from`](Self::transfer_from).
    pub fn try_transfer_from(&self, src: &Self) -> Result<(), TransferError>
    where
        T: Default,
    {
        if ptr::eq(self, src) {
            return Ok(());
        }

        let displaced = {
            let dest_guard = self.try_lock().ok_or(TransferError::DestinationBusy)?;
            let src_guard = src.try_lock().ok_or(TransferError::SourceBusy)?;
            Self::hand_over(self, src, (dest_guard, src_guard))
        };
        drop(displaced);
        Ok(())
    }

    /// Creates a new cell holding the contents of `src`.
    ///
    /// Blocks until `src` can be locked exclusively, then takes its storage
    /// (an owned allocation is moved, not copied) and leaves `src` holding
    /// `T::default()` inline. The new cell keeps `src`'s name.
    pub fn drain(src: &Self) -> Self
    where
        T: Default,
    {
        let fresh = Storage::embedded(T::default());

        let storage = {
            let _held = src.lock();
            // SAFETY: `src` is locked exclusively by `_held`.
            unsafe { mem::replace(src.storage_mut(), fresh) }
        };

        log::debug!("{}: drained into a new cell", src.name());
        Self::from_storage(src.name(), storage)
    }

    /// Locks two distinct cells exclusively, lower address first.
    ///
    /// The fixed order keeps two threads transferring between the same
    /// pair in opposite directions from deadlocking.
    fn lock_pair<'a>(
        a: &'a Self,
        b: &'a Self,
    ) -> (ExclusiveGuard<'a, T>, ExclusiveGuard<'a, T>) {
        debug_assert!(!ptr::eq(a, b));
        if ptr::from_ref(a) < ptr::from_ref(b) {
            let first = a.lock();
            let second = b.lock();
            (first, second)
        } else {
            let first = b.lock();
            let second = a.lock();
            (second, first)
        }
    }

    /// Moves `src`'s storage into `dest`, leaving a default value in `src`.
    ///
    /// Returns the displaced value of `dest`. The guards are released
    /// before returning.
    fn hand_over(
        dest: &Self,
        src: &Self,
        held: (ExclusiveGuard<'_, T>, ExclusiveGuard<'_, T>),
    ) -> T
    where
        T: Default,
    {
        // SAFETY: Both exclusive locks are held by `held`, which is not
        // dereferenced while these references are alive.
        let displaced = unsafe {
            mem::swap(dest.storage_mut(), src.storage_mut());
            mem::take(&mut *src.value_ptr())
        };
        drop(held);

        log::debug!("{}: took over storage of {}", dest.name(), src.name());
        displaced
    }
}
