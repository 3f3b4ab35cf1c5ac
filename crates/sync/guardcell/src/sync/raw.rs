//! Raw, data-less mutex used for both of the cell's locks.
//!
//! Unlike a `Mutex<T>`, a [`RawLock`] is locked and unlocked by hand, so the
//! lock can outlive the stack frame that took it and be released from a
//! different thread. The cell relies on both: a guard releases the lock in
//! its destructor, and the last reader of a group releases the exclusive
//! lock on behalf of the first.
//!
//! Normally this wraps `parking_lot::RawMutex` (with the `send_guard`
//! feature, which permits cross-thread unlock). Under `cfg(loom)` or
//! `cfg(shuttle)` it is a yield-loop over a model-checked `AtomicBool`.

use core::time::Duration;

#[cfg(not(any(loom, shuttle)))]
use parking_lot::lock_api::{RawMutex as RawMutexApi, RawMutexTimed};

#[cfg(any(loom, shuttle))]
use super::loom_compat::{AtomicBool, Ordering, yield_now};

/// A blocking mutex that protects no data.
pub(crate) struct RawLock {
    #[cfg(not(any(loom, shuttle)))]
    inner: parking_lot::RawMutex,
    #[cfg(any(loom, shuttle))]
    locked: AtomicBool,
}

#[cfg(not(any(loom, shuttle)))]
impl RawLock {
    /// Creates a new unlocked `RawLock`.
    pub(crate) const fn new() -> Self {
        Self {
            inner: <parking_lot::RawMutex as RawMutexApi>::INIT,
        }
    }

    /// Blocks the current thread until the lock is acquired.
    #[inline]
    pub(crate) fn lock(&self) {
        self.inner.lock();
    }

    /// Acquires the lock if it is free. Never parks.
    #[inline]
    pub(crate) fn try_lock(&self) -> bool {
        self.inner.try_lock()
    }

    /// Acquires the lock, parking for at most `timeout` while it is held
    /// elsewhere.
    #[inline]
    pub(crate) fn try_lock_for(&self, timeout: Duration) -> bool {
        self.inner.try_lock_for(timeout)
    }

    /// Releases the lock.
    ///
    /// # Safety
    ///
    /// The lock must be held, and the caller must be the party responsible
    /// for releasing it (not necessarily the thread that acquired it).
    #[inline]
    pub(crate) unsafe fn unlock(&self) {
        // SAFETY: Forwarded from the caller. `send_guard` makes cross-thread
        // unlock sound.
        unsafe { self.inner.unlock() };
    }

    /// Returns `true` if the lock is currently held.
    #[inline]
    pub(crate) fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

/// Attempts made by the model build's `try_lock_for` before giving up.
#[cfg(any(loom, shuttle))]
const MODEL_ATTEMPTS: usize = 3;

#[cfg(any(loom, shuttle))]
impl RawLock {
    pub(crate) fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    pub(crate) fn lock(&self) {
        // The model scheduler needs an explicit yield to make progress.
        while !self.try_lock() {
            yield_now();
        }
    }

    pub(crate) fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    // Time does not advance under the model scheduler, so the wait is
    // bounded by attempts instead.
    pub(crate) fn try_lock_for(&self, _timeout: Duration) -> bool {
        for _ in 1..MODEL_ATTEMPTS {
            if self.try_lock() {
                return true;
            }
            yield_now();
        }
        self.try_lock()
    }

    pub(crate) unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl RawLock {
    /// Acquires the lock and returns a scope guard that releases it.
    #[inline]
    pub(crate) fn lock_scoped(&self) -> RawLockGuard<'_> {
        self.lock();
        RawLockGuard { lock: self }
    }

    /// Like [`lock_scoped`](Self::lock_scoped), but never waits.
    #[inline]
    pub(crate) fn try_lock_scoped(&self) -> Option<RawLockGuard<'_>> {
        self.try_lock().then(|| RawLockGuard { lock: self })
    }

    /// Like [`lock_scoped`](Self::lock_scoped), but waits at most `timeout`.
    #[inline]
    pub(crate) fn try_lock_scoped_for(&self, timeout: Duration) -> Option<RawLockGuard<'_>> {
        self.try_lock_for(timeout).then(|| RawLockGuard { lock: self })
    }
}

/// Releases a [`RawLock`] when dropped.
pub(crate) struct RawLockGuard<'a> {
    lock: &'a RawLock,
}

impl Drop for RawLockGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: The guard only exists while the lock is held by this scope.
        unsafe { self.lock.unlock() };
    }
}

#[cfg(all(test, not(any(loom, shuttle))))]
mod tests {
    use super::*;

    #[test]
    fn lock_unlock() {
        let lock = RawLock::new();
        assert!(!lock.is_locked());
        lock.lock();
        assert!(lock.is_locked());
        unsafe { lock.unlock() };
        assert!(!lock.is_locked());
    }

    #[test]
    fn try_lock_fails_when_held() {
        let lock = RawLock::new();
        assert!(lock.try_lock());
        assert!(!lock.try_lock());
        unsafe { lock.unlock() };
        assert!(lock.try_lock());
        unsafe { lock.unlock() };
    }

    #[test]
    fn scoped_guard_releases() {
        let lock = RawLock::new();
        {
            let _guard = lock.lock_scoped();
            assert!(lock.is_locked());
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn scoped_try_lock_does_not_release_a_lock_it_never_took() {
        let lock = RawLock::new();
        lock.lock();
        assert!(lock.try_lock_scoped().is_none());
        assert!(lock.is_locked());
        unsafe { lock.unlock() };
        assert!(lock.try_lock_scoped().is_some());
        assert!(!lock.is_locked());
    }

    #[test]
    fn timed_lock_gives_up_while_held() {
        let lock = RawLock::new();
        let held = lock.lock_scoped();
        std::thread::scope(|s| {
            s.spawn(|| {
                assert!(lock.try_lock_scoped_for(Duration::from_millis(5)).is_none());
            });
        });
        drop(held);
        assert!(!lock.is_locked());
        let guard = lock.try_lock_scoped_for(Duration::from_millis(5));
        assert!(guard.is_some());
        assert!(lock.is_locked());
        drop(guard);
        assert!(!lock.is_locked());
    }

    #[test]
    fn unlock_from_another_thread() {
        let lock = RawLock::new();
        lock.lock();
        std::thread::scope(|s| {
            s.spawn(|| unsafe { lock.unlock() });
        });
        assert!(lock.try_lock());
        unsafe { lock.unlock() };
    }
}
