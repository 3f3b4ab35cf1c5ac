//! Per-cell lock contention statistics.
//!
//! Gated behind `cfg(guardcell_lock_stat)`. All counters are updated with
//! relaxed atomics; a snapshot taken while other threads are locking is
//! approximate.

use core::sync::atomic::{AtomicU64, Ordering};

/// Live counters embedded in each cell.
pub(crate) struct LockStats {
    exclusive_acquisitions: AtomicU64,
    shared_acquisitions: AtomicU64,
    contentions: AtomicU64,
    try_failures: AtomicU64,
}

impl LockStats {
    pub(crate) const fn new() -> Self {
        Self {
            exclusive_acquisitions: AtomicU64::new(0),
            shared_acquisitions: AtomicU64::new(0),
            contentions: AtomicU64::new(0),
            try_failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_exclusive(&self) {
        self.exclusive_acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_shared(&self) {
        self.shared_acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_contention(&self) {
        self.contentions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_try_failure(&self) {
        self.try_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LockStatsSnapshot {
        LockStatsSnapshot {
            exclusive_acquisitions: self.exclusive_acquisitions.load(Ordering::Relaxed),
            shared_acquisitions: self.shared_acquisitions.load(Ordering::Relaxed),
            contentions: self.contentions.load(Ordering::Relaxed),
            try_failures: self.try_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of a cell's lock statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStatsSnapshot {
    /// Exclusive guards handed out.
    pub exclusive_acquisitions: u64,
    /// Shared guards handed out.
    pub shared_acquisitions: u64,
    /// Blocking acquisitions of the exclusive mutex that had to wait.
    pub contentions: u64,
    /// `try_lock` / `try_peek` calls that returned `None`.
    pub try_failures: u64,
}
