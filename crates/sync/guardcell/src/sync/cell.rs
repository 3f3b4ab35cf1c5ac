//! The data-owning reader-writer lock.
//!
//! ## Protocol
//!
//! Two raw mutexes implement the shared/exclusive discipline:
//!
//! - `exclusive` gates the existence of any access. A writer holds it for
//!   the lifetime of its guard; a group of readers holds it collectively.
//! - `bookkeeping` is held only around updates to `readers`, so that the
//!   count change and the conditional take/release of `exclusive` happen as
//!   one step.
//!
//! The reader whose increment moves `readers` from 0 to 1 locks
//! `exclusive` before dropping `bookkeeping`; the reader whose decrement
//! moves it back to 0 unlocks `exclusive`. A writer therefore cannot slip in
//! between the count becoming nonzero and the readers taking the lock.

use core::fmt;
use core::mem::ManuallyDrop;
use core::time::Duration;

use super::guard::{AccessMode, ExclusiveGuard, SharedGuard};
use super::loom_compat::{AtomicUsize, Ordering, UnsafeCell};
use super::raw::{RawLock, RawLockGuard};
#[cfg(guardcell_lock_stat)]
use super::stat::{LockStats, LockStatsSnapshot};
use super::storage::Storage;

/// Longest [`GuardedCell::try_peek`] waits for the bookkeeping lock.
const BOOKKEEPING_PATIENCE: Duration = Duration::from_millis(1);

/// A value together with the reader-writer lock that protects it.
///
/// Access goes through [`lock`](Self::lock) / [`try_lock`](Self::try_lock)
/// for read/write and [`peek`](Self::peek) / [`try_peek`](Self::try_peek)
/// for read-only. The value is stored inline ([`new`](Self::new)) or in a
/// separate heap allocation the cell owns ([`from_box`](Self::from_box),
/// [`boxed`](Self::boxed)); the two behave identically apart from where the
/// value lives.
///
/// Locking is not re-entrant: calling `lock` or `peek` on a cell while the
/// same thread already holds a guard on it can deadlock. No fairness is
/// provided between readers and writers.
///
/// # Example
///
/// ```ignore
/// let cell = GuardedCell::new(0);
///
/// {
///     let mut guard = cell.lock();
///     *guard += 1;
/// }
///
/// let a = cell.peek();
/// let b = cell.peek();
/// assert_eq!(*a + *b, 2);
/// ```
pub struct GuardedCell<T> {
    exclusive: RawLock,
    bookkeeping: RawLock,
    /// Live shared guards. Only modified with `bookkeeping` held.
    readers: AtomicUsize,
    name: &'static str,
    #[cfg(guardcell_lock_stat)]
    stats: LockStats,
    /// Replaced only by transfers, which hold `exclusive`. Finalized by
    /// `Drop` or taken by `into_storage`.
    storage: UnsafeCell<ManuallyDrop<Storage<T>>>,
}

// SAFETY: The cell owns `T` (inline or behind an owned pointer), so moving
// the cell moves a `T`.
unsafe impl<T: Send> Send for GuardedCell<T> {}
// SAFETY: Shared guards hand out `&T` to several threads at once (requiring
// `T: Sync`); an exclusive guard hands out `&mut T` to one thread at a time
// (requiring `T: Send`).
unsafe impl<T: Send + Sync> Sync for GuardedCell<T> {}

impl<T> GuardedCell<T> {
    /// Creates a new unlocked cell storing `value` inline.
    pub fn new(value: T) -> Self {
        Self::from_storage("<unnamed>", Storage::embedded(value))
    }

    /// Creates a new unlocked cell storing `value` inline, with a name used
    /// in diagnostics.
    pub fn named(name: &'static str, value: T) -> Self {
        Self::from_storage(name, Storage::embedded(value))
    }

    /// Creates a new unlocked cell that takes ownership of an existing heap
    /// allocation.
    ///
    /// The allocation is not copied; it is freed when the cell is dropped.
    pub fn from_box(value: Box<T>) -> Self {
        Self::from_storage("<unnamed>", Storage::owned(value))
    }

    /// Creates a new unlocked cell whose value lives in a fresh heap
    /// allocation owned by the cell.
    pub fn boxed(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Sets the name used in diagnostics.
    #[must_use]
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub(crate) fn from_storage(name: &'static str, storage: Storage<T>) -> Self {
        Self {
            exclusive: RawLock::new(),
            bookkeeping: RawLock::new(),
            readers: AtomicUsize::new(0),
            name,
            #[cfg(guardcell_lock_stat)]
            stats: LockStats::new(),
            storage: UnsafeCell::new(ManuallyDrop::new(storage)),
        }
    }

    /// Acquires exclusive access, blocking until no other guard exists.
    pub fn lock(&self) -> ExclusiveGuard<'_, T> {
        self.acquire_exclusive();

        #[cfg(guardcell_lock_stat)]
        self.stats.record_exclusive();

        ExclusiveGuard::new(self)
    }

    /// Attempts to acquire exclusive access without blocking.
    ///
    /// Returns `None` immediately if any guard exists.
    pub fn try_lock(&self) -> Option<ExclusiveGuard<'_, T>> {
        if self.exclusive.try_lock() {
            #[cfg(guardcell_lock_stat)]
            self.stats.record_exclusive();

            Some(ExclusiveGuard::new(self))
        } else {
            #[cfg(guardcell_lock_stat)]
            self.stats.record_try_failure();

            None
        }
    }

    /// Acquires shared access, blocking while an exclusive guard exists.
    ///
    /// Once some reader holds the cell, further readers get in without
    /// waiting on the exclusive lock.
    pub fn peek(&self) -> SharedGuard<'_, T> {
        let _books = self.bookkeeping.lock_scoped();

        let readers = self.readers.fetch_add(1, Ordering::Relaxed) + 1;
        if readers == 1 {
            // First reader: take the exclusive lock for the whole group
            // before anyone else can see the nonzero count.
            self.acquire_exclusive();
        }

        #[cfg(guardcell_lock_stat)]
        self.stats.record_shared();

        SharedGuard::new(self)
    }

    /// Attempts to acquire shared access without waiting on a writer.
    ///
    /// Returns `None` if an exclusive guard exists. Succeeds immediately if
    /// other readers already hold the cell.
    ///
    /// The bookkeeping lock is waited on for at most a millisecond. Readers
    /// entering or leaving hold it only for a counter update; a first reader
    /// blocked in [`peek`](Self::peek) behind a writer holds it until the
    /// writer leaves, and in that case this gives up and returns `None`.
    pub fn try_peek(&self) -> Option<SharedGuard<'_, T>> {
        self.join_readers(self.bookkeeping.try_lock_scoped_for(BOOKKEEPING_PATIENCE))
    }

    /// Joins the reader group if the bookkeeping lock was obtained and
    /// either other readers hold the cell or it is free.
    fn join_readers(&self, books: Option<RawLockGuard<'_>>) -> Option<SharedGuard<'_, T>> {
        let Some(_books) = books else {
            #[cfg(guardcell_lock_stat)]
            self.stats.record_try_failure();

            return None;
        };

        let readers = self.readers.fetch_add(1, Ordering::Relaxed) + 1;
        if readers == 1 && !self.exclusive.try_lock() {
            self.readers.fetch_sub(1, Ordering::Relaxed);

            #[cfg(guardcell_lock_stat)]
            self.stats.record_try_failure();

            return None;
        }

        #[cfg(guardcell_lock_stat)]
        self.stats.record_shared();

        Some(SharedGuard::new(self))
    }

    /// Hands an access right back. Called only from a guard's lease.
    pub(crate) fn release(&self, mode: AccessMode) {
        match mode {
            AccessMode::Exclusive => {
                // SAFETY: An exclusive lease exists only while `exclusive` is
                // held on its behalf, and it releases exactly once.
                unsafe { self.exclusive.unlock() };
            }
            AccessMode::Shared => {
                let _books = self.bookkeeping.lock_scoped();

                let previous = self.readers.fetch_sub(1, Ordering::Relaxed);
                debug_assert!(previous > 0, "{}: reader count underflow", self.name);
                if previous == 1 {
                    // Last reader: release the lock taken by the first.
                    // SAFETY: `readers > 0` implies `exclusive` is held for
                    // the reader group, and this is the group's last member.
                    unsafe { self.exclusive.unlock() };
                }
            }
            AccessMode::Released => {}
        }
    }

    /// Blocks until `exclusive` is acquired.
    fn acquire_exclusive(&self) {
        if self.exclusive.try_lock() {
            return;
        }

        log::trace!("{}: contended, waiting for exclusive lock", self.name);

        #[cfg(guardcell_lock_stat)]
        self.stats.record_contention();

        self.exclusive.lock();
    }

    /// Returns a pointer to the protected value for writing.
    ///
    /// Only dereference it while holding an exclusive lease, or with
    /// `&mut self`.
    #[inline]
    pub(crate) fn value_ptr(&self) -> *mut T {
        // SAFETY: `storage` is only replaced while `exclusive` is held by the
        // replacing transfer, so no lease is dereferencing concurrently.
        unsafe { (*self.storage.get_const()).as_ptr() }
    }

    /// Returns a pointer to the protected value for reading.
    ///
    /// Only dereference it while holding a lease.
    #[inline]
    pub(crate) fn value_const_ptr(&self) -> *const T {
        // SAFETY: As in `value_ptr`.
        unsafe { (*self.storage.get_const()).as_const_ptr() }
    }

    /// Returns the storage for replacement.
    ///
    /// # Safety
    ///
    /// The caller must hold `exclusive` through a guard that it does not
    /// dereference while the returned reference is alive.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn storage_mut(&self) -> &mut Storage<T> {
        // SAFETY: Forwarded from the caller.
        unsafe { &mut *self.storage.get() }
    }

    /// Returns a mutable reference to the value.
    ///
    /// No locking is needed: the `&mut` borrow proves no guard exists.
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: `&mut self` excludes every guard.
        unsafe { &mut *self.value_ptr() }
    }

    /// Consumes the cell and returns the value.
    pub fn into_inner(self) -> T {
        self.into_storage().into_inner()
    }

    /// Consumes the cell and returns the value in a box.
    ///
    /// A cell created with [`from_box`](Self::from_box) or
    /// [`boxed`](Self::boxed) gives back its existing allocation.
    pub fn into_box(self) -> Box<T> {
        self.into_storage().into_box()
    }

    fn into_storage(self) -> Storage<T> {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the storage is taken exactly
        // once and not finalized by `Drop`. The remaining fields hold no
        // resources.
        unsafe { ManuallyDrop::take(this.storage.get_mut()) }
    }

    /// Returns the diagnostic name of this cell.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if any guard currently holds the cell.
    ///
    /// The answer may be stale by the time it is used.
    pub fn is_locked(&self) -> bool {
        self.exclusive.is_locked()
    }

    /// Returns `true` if the value is stored inline rather than in a
    /// separate allocation.
    pub fn is_embedded(&mut self) -> bool {
        self.storage.get_mut().is_embedded()
    }

    /// Number of live shared guards.
    pub(crate) fn reader_count(&self) -> usize {
        self.readers.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of this cell's contention statistics.
    #[cfg(guardcell_lock_stat)]
    pub fn stats(&self) -> LockStatsSnapshot {
        self.stats.snapshot()
    }
}

impl<T> Drop for GuardedCell<T> {
    fn drop(&mut self) {
        // A live guard borrows the cell, so the lock can only still be held
        // here if a guard was leaked with `mem::forget`.
        let locked = self.exclusive.try_lock();
        if !locked {
            log::warn!(
                "{}: dropped while locked ({} readers); a guard was leaked",
                self.name,
                self.reader_count()
            );
        }

        // SAFETY: `&mut self` excludes every other access and the storage
        // is finalized only here.
        unsafe { ManuallyDrop::drop(self.storage.get_mut()) };

        if locked {
            // SAFETY: Acquired above.
            unsafe { self.exclusive.unlock() };
        }
    }
}

impl<T: Default> Default for GuardedCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for GuardedCell<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> From<Box<T>> for GuardedCell<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for GuardedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("GuardedCell");
        d.field("name", &self.name);
        // Never waits: the caller may be the writer itself.
        match self.join_readers(self.bookkeeping.try_lock_scoped()) {
            Some(guard) => {
                d.field("data", &&*guard);
                d.field("readers", &self.reader_count());
            }
            None => {
                d.field("data", &format_args!("<locked>"));
            }
        }
        d.finish_non_exhaustive()
    }
}
