//! Small shared helpers.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the guard if a panicking task poisoned it.
///
/// All guarded state in this crate stays structurally valid across every
/// mutation (no lock is held across an await), so a poisoned lock carries no
/// torn invariants worth propagating.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
