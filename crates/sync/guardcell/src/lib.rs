//! A data-owning reader-writer lock.
//!
//! [`GuardedCell`] holds a value and is itself the synchronization mechanism
//! for it: the only way to reach the value is through an
//! [`ExclusiveGuard`] (read/write) or a [`SharedGuard`] (read-only), and the
//! lock is held exactly as long as the guard lives.
//!
//! The shared/exclusive discipline is built from two plain mutexes: one
//! gating all access, and a short-held one serializing the reader count.
//! The first reader of a group takes the exclusive mutex on behalf of every
//! reader and the last reader releases it.
//!
//! There is no fairness between readers and writers: a continuous stream
//! of readers can starve a waiting writer.

mod error;
pub mod sync;

pub use error::TransferError;
pub use sync::{ExclusiveGuard, GuardedCell, SharedGuard};

#[cfg(guardcell_lock_stat)]
pub use sync::LockStatsSnapshot;
