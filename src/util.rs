//! Shared internal helpers.

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the guard if a collaborator thread panicked
/// while holding it. The protected data is still structurally valid in
/// every state this crate leaves it in, and a wedged registry would turn
/// one panic into a process-wide deadlock.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("wrapper mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
