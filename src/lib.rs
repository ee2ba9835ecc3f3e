//! Identity-preserving, reference-counted wrappers for foreign API handles.
//!
//! This crate is the ownership layer a family of Rust bindings over a
//! driver-style C API builds on. It solves two problems independent of
//! what a handle represents:
//!
//! - a given native handle is represented by exactly one in-process
//!   [`Wrapper`], shared safely across threads and destroyed exactly once
//!   when its last owner releases it;
//! - descriptive attributes of a handle, retrieved through the foreign
//!   API's two-call "query size, then query value" shape, are cached per
//!   wrapper so repeated lookups avoid foreign round-trips.
//!
//! Concrete wrapper crates (platform/device/context/queue-style) supply
//! the actual foreign release and query calls through [`ReleaseFn`],
//! [`QuerySingle`] and [`QueryPair`]; this crate never interprets a
//! handle itself.
//!
//! # Thread Safety
//!
//! All types are `Send + Sync`. The registry table is guarded by one
//! mutex held only for table operations, never across foreign calls.
//! Reference counting is lock-free. Each wrapper's attribute cache has
//! its own mutex, also never held across foreign calls.
//!
//! # Memory Management
//!
//! - Every wrapper handed out by [`Registry::find_or_create`] and every
//!   [`Wrapper::retain`] must be balanced by one [`Wrapper::release`].
//! - The release that drops the count to zero tears the wrapper down:
//!   foreign release hook, cache, registry entry, collaborator fields,
//!   in that order — even if the foreign release reports a failure.
//! - [`Registry::memcheck`] is the leak check: true exactly when no
//!   wrapper is alive.

mod attr;
mod error;
mod handle;
mod query;
mod registry;
mod state;
mod util;
mod wrapper;

pub use attr::{AttrBlob, AttrId, AttrValue};
pub use error::WrapError;
pub use handle::NativeHandle;
pub use query::{AttrQuery, CacheMode, QueryPair, QuerySingle, Status};
pub use registry::Registry;
pub use state::{RegistryStats, WrapperStats};
pub use wrapper::{ReleaseFn, Wrapper, WrapperConfig};

/// Crate version string (e.g. "0.1.0").
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
