//! Two-phase attribute queries against the foreign API.
//!
//! Most "get info" style foreign APIs share one call shape: invoked once
//! with no value buffer to learn the value size, then again with a buffer
//! of that size to fetch the value. This module keeps that shape intact
//! and expresses the two query arities the foreign APIs come in — keyed
//! by one handle, or by a pair of handles ("this resource under that
//! context") — as separate capability traits selected through
//! [`AttrQuery`].

use crate::attr::{AttrBlob, AttrId};
use crate::error::WrapError;
use crate::handle::NativeHandle;
use crate::wrapper::Wrapper;
use std::fmt;

/// Raw status code returned by a foreign call. Zero is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(libc::c_int);

impl Status {
    pub const SUCCESS: Status = Status(0);

    pub const fn new(code: libc::c_int) -> Self {
        Self(code)
    }

    pub const fn code(self) -> libc::c_int {
        self.0
    }

    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.0)
    }
}

/// A two-phase query keyed by a single handle.
///
/// `buf` absent is the size probe: report the value size in bytes. `buf`
/// present is the value fetch: fill the buffer (sized from the probe) and
/// report how many bytes were written. Either phase may fail with a
/// foreign status.
pub trait QuerySingle: Send + Sync {
    fn query(
        &self,
        handle: NativeHandle,
        attr: AttrId,
        buf: Option<&mut [u8]>,
    ) -> Result<usize, Status>;
}

impl<F> QuerySingle for F
where
    F: Fn(NativeHandle, AttrId, Option<&mut [u8]>) -> Result<usize, Status> + Send + Sync,
{
    fn query(
        &self,
        handle: NativeHandle,
        attr: AttrId,
        buf: Option<&mut [u8]>,
    ) -> Result<usize, Status> {
        self(handle, attr, buf)
    }
}

/// A two-phase query keyed by a pair of handles.
///
/// Same probe/fetch protocol as [`QuerySingle`], with a secondary handle
/// for attributes that are relative to another wrapped object.
pub trait QueryPair: Send + Sync {
    fn query(
        &self,
        handle: NativeHandle,
        secondary: NativeHandle,
        attr: AttrId,
        buf: Option<&mut [u8]>,
    ) -> Result<usize, Status>;
}

impl<F> QueryPair for F
where
    F: Fn(NativeHandle, NativeHandle, AttrId, Option<&mut [u8]>) -> Result<usize, Status>
        + Send
        + Sync,
{
    fn query(
        &self,
        handle: NativeHandle,
        secondary: NativeHandle,
        attr: AttrId,
        buf: Option<&mut [u8]>,
    ) -> Result<usize, Status> {
        self(handle, secondary, attr, buf)
    }
}

/// The query source for one attribute lookup: which shape to call, and
/// the secondary wrapper when the shape needs one.
#[derive(Clone, Copy)]
pub enum AttrQuery<'q> {
    /// Query keyed by the owning wrapper's handle alone.
    Single(&'q dyn QuerySingle),
    /// Query keyed by the owning wrapper's handle and `secondary`'s.
    Pair {
        query: &'q dyn QueryPair,
        secondary: &'q Wrapper,
    },
}

/// Whether a lookup may be served from the wrapper's attribute cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Serve a cached entry when present; query and cache otherwise.
    Cached,
    /// Always query, replacing any cached entry. For attributes whose
    /// value can legitimately change between queries.
    Refresh,
}

impl AttrQuery<'_> {
    fn call(
        &self,
        handle: NativeHandle,
        attr: AttrId,
        buf: Option<&mut [u8]>,
    ) -> Result<usize, Status> {
        match self {
            AttrQuery::Single(q) => q.query(handle, attr, buf),
            AttrQuery::Pair { query, secondary } => {
                query.query(handle, secondary.native(), attr, buf)
            }
        }
    }

    /// Run the full probe-then-fetch protocol for `attr` against `handle`.
    ///
    /// No locks are held here; the foreign calls may block.
    pub(crate) fn fetch(&self, handle: NativeHandle, attr: AttrId) -> Result<AttrBlob, WrapError> {
        let size = self
            .call(handle, attr, None)
            .map_err(|status| WrapError::QuerySize { attr, status })?;
        if size == 0 {
            return Err(WrapError::ZeroSize { attr });
        }

        let mut blob = AttrBlob::new(size);
        self.call(handle, attr, Some(blob.bytes_mut()))
            .map_err(|status| WrapError::QueryValue { attr, status })?;
        Ok(blob)
    }
}
