//! The guarded cell and its access guards.
//!
//! Provides [`GuardedCell`], a value that carries its own reader-writer
//! lock, and the [`ExclusiveGuard`] / [`SharedGuard`] handles through which
//! the value is reached.

mod cell;
mod guard;
mod raw;
#[cfg(guardcell_lock_stat)]
mod stat;
mod storage;
mod transfer;

pub(crate) mod loom_compat;



#[cfg(all(test, shuttle, not(loom)))]
mod shuttle_tests;

pub use cell::GuardedCell;
pub use guard::{ExclusiveGuard, SharedGuard};
#[cfg(guardcell_lock_stat)]
pub use stat::LockStatsSnapshot;
