//! Diagnostic snapshots of registry and wrapper state.

use crate::registry::Registry;
use crate::wrapper::Wrapper;
use serde::Serialize;

/// Diagnostic view of one live wrapper.
#[derive(Debug, Serialize)]
pub struct WrapperStats {
    /// Native handle, formatted as hex.
    pub handle: String,
    /// Reference count at snapshot time (advisory; see
    /// [`Wrapper::ref_count`]).
    pub ref_count: usize,
    /// Number of cached attribute entries.
    pub cached_attrs: usize,
}

impl From<&Wrapper> for WrapperStats {
    fn from(w: &Wrapper) -> Self {
        Self {
            handle: w.native().to_string(),
            ref_count: w.ref_count(),
            cached_attrs: w.cached_attr_count(),
        }
    }
}

/// Diagnostic view of a registry and its live wrappers.
///
/// Snapshots are advisory: counts may be stale by the time the caller
/// reads them. Taking one does not touch any wrapper's reference count.
#[derive(Debug, Default, Serialize)]
pub struct RegistryStats {
    /// Number of live wrappers.
    pub wrapper_count: usize,
    /// Total cached attribute entries across all wrappers.
    pub cached_attrs: usize,
    /// Per-wrapper details, ordered by handle.
    pub wrappers: Vec<WrapperStats>,
}

impl RegistryStats {
    /// Serialize the snapshot as a JSON string, for logs and reports.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Registry {
    /// Take a diagnostic snapshot of this registry.
    pub fn stats(&self) -> RegistryStats {
        let mut live = self.live_wrappers();
        live.sort_by_key(|w| w.native().bits());

        let wrappers: Vec<WrapperStats> = live.iter().map(|w| WrapperStats::from(&**w)).collect();
        RegistryStats {
            wrapper_count: wrappers.len(),
            cached_attrs: wrappers.iter().map(|w| w.cached_attrs).sum(),
            wrappers,
        }
    }
}
