//! Process-wide table enforcing one live wrapper per native handle.

use crate::error::WrapError;
use crate::handle::NativeHandle;
use crate::util::lock_unpoisoned;
use crate::wrapper::{Wrapper, WrapperConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Registry of all live wrappers, keyed by native handle identity.
///
/// The registry is explicit shared state: create one per foreign
/// subsystem (usually once per process) and hand an `Arc` of it to every
/// concrete wrapper constructor. The inner table is allocated on the
/// first construction and dropped again when the last wrapper is removed,
/// so an idle registry holds nothing — which is exactly what
/// [`memcheck`](Registry::memcheck) reports.
///
/// Entries are lookup references, not owners: a wrapper's lifetime is
/// governed solely by its reference count, and teardown removes the entry
/// before the count can be observed at zero by a later lookup.
pub struct Registry {
    table: Mutex<Option<HashMap<NativeHandle, Arc<Wrapper>>>>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            table: Mutex::new(None),
        })
    }

    /// Return the live wrapper for `handle`, creating and registering one
    /// if none exists.
    ///
    /// On a hit the wrapper's reference count is incremented before it is
    /// returned; on a miss `init` supplies the release hook and
    /// collaborator fields for the new wrapper, which starts at count 1.
    /// Either way the caller owns one logical reference and must balance
    /// it with [`Wrapper::release`].
    ///
    /// The table lock is held across the whole check-then-insert so two
    /// racing calls for the same handle cannot both create a wrapper.
    /// `init` runs under that lock and must not reenter the registry.
    pub fn find_or_create<F>(
        self: &Arc<Self>,
        handle: NativeHandle,
        init: F,
    ) -> Result<Arc<Wrapper>, WrapError>
    where
        F: FnOnce() -> WrapperConfig,
    {
        if handle.is_null() {
            return Err(WrapError::NullHandle);
        }

        let mut table = lock_unpoisoned(&self.table);
        let map = table.get_or_insert_with(HashMap::new);

        if let Some(existing) = map.get(&handle) {
            // An entry whose count already hit zero belongs to a teardown
            // that has not yet reached `remove` (it needs this lock). It
            // must not be revived; fall through and replace it. The
            // identity check in `remove` keeps the stale teardown from
            // evicting the replacement.
            if existing.retain_if_live() {
                return Ok(Arc::clone(existing));
            }
        }

        let wrapper = Wrapper::alloc(handle, init(), Arc::clone(self));
        map.insert(handle, Arc::clone(&wrapper));
        tracing::debug!(handle = %handle, "registered wrapper");
        Ok(wrapper)
    }

    /// Remove `wrapper`'s entry. Called once per wrapper, from teardown.
    ///
    /// The entry is only erased if it still maps to `wrapper`: a
    /// concurrent `find_or_create` may already have replaced a dying
    /// entry with a fresh wrapper for the same handle.
    pub(crate) fn remove(&self, handle: NativeHandle, wrapper: &Wrapper) {
        let mut table = lock_unpoisoned(&self.table);
        if let Some(map) = table.as_mut() {
            if map
                .get(&handle)
                .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry), wrapper))
            {
                map.remove(&handle);
                tracing::debug!(handle = %handle, "removed wrapper");
            }
            if map.is_empty() {
                // Last wrapper gone: drop the table itself so the
                // registry returns to its initial state.
                *table = None;
            }
        }
    }

    /// True iff no wrapper is currently alive in this registry.
    ///
    /// Leak-check primitive for test teardown assertions; never use it
    /// for control decisions.
    pub fn memcheck(&self) -> bool {
        lock_unpoisoned(&self.table).is_none()
    }

    /// Number of live wrappers. Diagnostic only.
    pub fn wrapper_count(&self) -> usize {
        lock_unpoisoned(&self.table)
            .as_ref()
            .map_or(0, HashMap::len)
    }

    /// Snapshot of the live wrappers, for diagnostics.
    pub(crate) fn live_wrappers(&self) -> Vec<Arc<Wrapper>> {
        lock_unpoisoned(&self.table)
            .as_ref()
            .map_or_else(Vec::new, |map| map.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_and_stays_empty_without_wrappers() {
        let registry = Registry::new();
        assert!(registry.memcheck());
        assert_eq!(registry.wrapper_count(), 0);
    }

    #[test]
    fn null_handle_is_rejected() {
        let registry = Registry::new();
        let err = registry
            .find_or_create(NativeHandle::NULL, WrapperConfig::new)
            .unwrap_err();
        assert!(matches!(err, WrapError::NullHandle));
        // A failed construction must not leave a table behind.
        assert!(registry.memcheck());
    }

    #[test]
    fn table_is_dropped_when_the_last_wrapper_goes() {
        let registry = Registry::new();
        let a = registry
            .find_or_create(NativeHandle::new(0x10), WrapperConfig::new)
            .unwrap();
        let b = registry
            .find_or_create(NativeHandle::new(0x20), WrapperConfig::new)
            .unwrap();
        assert_eq!(registry.wrapper_count(), 2);

        assert!(a.release().unwrap());
        assert!(!registry.memcheck());
        assert!(b.release().unwrap());
        assert!(registry.memcheck());
    }
}
