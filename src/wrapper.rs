//! Reference-counted wrapper objects and their attribute cache.

use crate::attr::{AttrBlob, AttrId, AttrValue};
use crate::error::WrapError;
use crate::handle::NativeHandle;
use crate::query::{AttrQuery, CacheMode, Status};
use crate::registry::Registry;
use crate::util::lock_unpoisoned;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Release hook for the wrapped foreign handle.
///
/// Invoked exactly once, from the teardown that drops the reference count
/// to zero. A non-success status is surfaced to the releasing caller but
/// does not stop teardown.
pub trait ReleaseFn: Send + Sync {
    fn release(&self, handle: NativeHandle) -> Status;
}

impl<F> ReleaseFn for F
where
    F: Fn(NativeHandle) -> Status + Send + Sync,
{
    fn release(&self, handle: NativeHandle) -> Status {
        self(handle)
    }
}

/// Collaborator-supplied pieces of a new wrapper: the foreign release
/// hook and any concrete-wrapper state to carry alongside the handle.
///
/// Both are optional. The fields value is dropped at teardown, after the
/// foreign handle has been released and the wrapper deregistered, so its
/// `Drop` impl is the place to free concrete-wrapper resources.
#[derive(Default)]
pub struct WrapperConfig {
    release: Option<Box<dyn ReleaseFn>>,
    fields: Option<Box<dyn Any + Send>>,
}

impl WrapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the foreign release hook.
    pub fn release_with(mut self, hook: impl ReleaseFn + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    /// Attach concrete-wrapper fields.
    pub fn fields(mut self, fields: impl Any + Send) -> Self {
        self.fields = Some(Box::new(fields));
        self
    }
}

/// The in-process proxy for one native handle.
///
/// Obtained through [`Registry::find_or_create`], which guarantees at
/// most one live `Wrapper` per handle. The wrapper carries an explicit
/// reference count on top of the `Arc` that shares it: the count tracks
/// logical ownership of the *foreign* resource, while the `Arc` only
/// keeps the memory alive. Every `find_or_create` and [`retain`] must be
/// balanced by one [`release`]; the release that reaches zero tears the
/// wrapper down and releases the foreign handle.
///
/// [`retain`]: Wrapper::retain
/// [`release`]: Wrapper::release
pub struct Wrapper {
    handle: NativeHandle,
    refs: AtomicUsize,
    cache: Mutex<HashMap<AttrId, Arc<AttrBlob>>>,
    fields: Mutex<Option<Box<dyn Any + Send>>>,
    release_native: Option<Box<dyn ReleaseFn>>,
    registry: Arc<Registry>,
}

impl std::fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wrapper")
            .field("handle", &self.handle)
            .field("refs", &self.refs)
            .finish_non_exhaustive()
    }
}

impl Wrapper {
    pub(crate) fn alloc(
        handle: NativeHandle,
        config: WrapperConfig,
        registry: Arc<Registry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            handle,
            refs: AtomicUsize::new(1),
            cache: Mutex::new(HashMap::new()),
            fields: Mutex::new(config.fields),
            release_native: config.release,
            registry,
        })
    }

    /// The wrapped native handle.
    pub fn native(&self) -> NativeHandle {
        self.handle
    }

    /// Take one more logical reference. Lock-free.
    pub fn retain(&self) {
        let prev = self.refs.fetch_add(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "retain on a wrapper already torn down");
    }

    /// Take a reference only if the count has not already hit zero.
    /// Registry lookups use this to avoid reviving a dying wrapper.
    pub(crate) fn retain_if_live(&self) -> bool {
        self.refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n > 0).then_some(n + 1)
            })
            .is_ok()
    }

    /// Give up one logical reference.
    ///
    /// The call that drops the count to zero — exactly one, even under
    /// concurrent release from many threads — performs teardown before
    /// returning: the foreign handle is released through the hook, cached
    /// attribute values are dropped, the wrapper is removed from its
    /// registry, and the collaborator fields are dropped, in that order.
    ///
    /// Returns `Ok(false)` when other logical owners remain, `Ok(true)`
    /// when this call tore the wrapper down, and `Err` when it tore the
    /// wrapper down but the foreign release reported a failure. In the
    /// latter two cases the wrapper must not be used again, even though
    /// shared `Arc` clones keep the memory valid.
    pub fn release(&self) -> Result<bool, WrapError> {
        let prev = self.refs.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "release on a wrapper with no owners left");
        if prev != 1 {
            return Ok(false);
        }

        tracing::debug!(handle = %self.handle, "tearing down wrapper");

        // Release the foreign handle first. A failure is recorded and
        // surfaced below, never allowed to stop teardown: leaving a
        // half-dead wrapper registered would both leak it and block the
        // handle from ever being wrapped again.
        let failed = self.release_native.as_ref().and_then(|hook| {
            let status = hook.release(self.handle);
            (!status.is_success()).then(|| {
                tracing::warn!(handle = %self.handle, code = status.code(), "native release failed");
                WrapError::Release {
                    handle: self.handle,
                    status,
                }
            })
        });

        // Drop cached attribute values. Blob clones already handed to
        // callers stay valid on their own.
        lock_unpoisoned(&self.cache).clear();

        self.registry.remove(self.handle, self);

        // Collaborator fields go last; their Drop impls run here.
        let fields = lock_unpoisoned(&self.fields).take();
        drop(fields);

        match failed {
            Some(err) => Err(err),
            None => Ok(true),
        }
    }

    /// Snapshot of the reference count. Diagnostic only: the value may be
    /// stale by the time the caller looks at it.
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Relaxed)
    }

    /// Get an attribute value, consulting the cache per `mode`.
    ///
    /// A miss (or [`CacheMode::Refresh`]) runs the two-phase foreign
    /// protocol in `query` and publishes the result. The cache lock is
    /// never held across the foreign calls, so two threads racing on the
    /// same uncached attribute may both query; in [`CacheMode::Cached`]
    /// the first published entry wins and both observe it.
    pub fn attr(
        &self,
        attr: AttrId,
        query: AttrQuery<'_>,
        mode: CacheMode,
    ) -> Result<Arc<AttrBlob>, WrapError> {
        if mode == CacheMode::Cached {
            if let Some(hit) = lock_unpoisoned(&self.cache).get(&attr) {
                return Ok(Arc::clone(hit));
            }
        }

        let blob = Arc::new(query.fetch(self.handle, attr)?);
        let mut cache = lock_unpoisoned(&self.cache);
        Ok(match mode {
            CacheMode::Cached => Arc::clone(cache.entry(attr).or_insert(blob)),
            CacheMode::Refresh => {
                cache.insert(attr, Arc::clone(&blob));
                blob
            }
        })
    }

    /// Get an attribute's size in bytes.
    pub fn attr_size(
        &self,
        attr: AttrId,
        query: AttrQuery<'_>,
        mode: CacheMode,
    ) -> Result<usize, WrapError> {
        Ok(self.attr(attr, query, mode)?.size())
    }

    /// Get an attribute value decoded as `T`.
    pub fn attr_value<T: AttrValue>(
        &self,
        attr: AttrId,
        query: AttrQuery<'_>,
        mode: CacheMode,
    ) -> Result<T, WrapError> {
        let blob = self.attr(attr, query, mode)?;
        blob.value::<T>().ok_or_else(|| WrapError::ValueShape {
            attr,
            size: blob.size(),
            wanted: std::any::type_name::<T>(),
        })
    }

    /// Seed or overwrite a cache entry with a collaborator-computed
    /// value. Later [`CacheMode::Cached`] lookups return it without a
    /// foreign call.
    pub fn put_attr(&self, attr: AttrId, blob: AttrBlob) {
        lock_unpoisoned(&self.cache).insert(attr, Arc::new(blob));
    }

    /// Run `f` over the collaborator fields, if they are present and of
    /// type `T`. Returns `None` after teardown or on a type mismatch.
    pub fn with_fields<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = lock_unpoisoned(&self.fields);
        let fields = guard.as_mut()?.downcast_mut::<T>()?;
        Some(f(fields))
    }

    pub(crate) fn cached_attr_count(&self) -> usize {
        lock_unpoisoned(&self.cache).len()
    }
}
