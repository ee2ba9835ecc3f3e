//! Error handling for wrapper construction, attribute queries and teardown.

use crate::attr::AttrId;
use crate::handle::NativeHandle;
use crate::query::Status;
use thiserror::Error;

/// Errors reported by the wrapper layer.
///
/// Construction and query errors abort the requested operation; no retry
/// is attempted here (retry policy belongs to the caller). A `Release`
/// error is different: it is surfaced from the final `release` call, but
/// teardown has already completed by the time the caller sees it — the
/// wrapper is gone either way.
#[derive(Debug, Error)]
pub enum WrapError {
    /// A null native handle was passed to a construction path.
    #[error("cannot wrap a null native handle")]
    NullHandle,

    /// The foreign size probe for an attribute reported a failure status.
    #[error("size probe for attribute {attr} failed with {status}")]
    QuerySize { attr: AttrId, status: Status },

    /// The foreign size probe reported a zero size. The foreign query
    /// contract uses zero as its own no-data signal, so this is never a
    /// valid empty value.
    #[error("size probe for attribute {attr} reported zero bytes")]
    ZeroSize { attr: AttrId },

    /// The foreign value fetch for an attribute reported a failure status.
    #[error("value fetch for attribute {attr} failed with {status}")]
    QueryValue { attr: AttrId, status: Status },

    /// The foreign release call failed during teardown. Teardown still
    /// ran to completion: cache, registry entry and collaborator fields
    /// are gone.
    #[error("native release of handle {handle} failed with {status}")]
    Release {
        handle: NativeHandle,
        status: Status,
    },

    /// A cached attribute value did not match the shape the caller asked
    /// it to be read as.
    #[error("attribute {attr} holds {size} bytes, not readable as {wanted}")]
    ValueShape {
        attr: AttrId,
        size: usize,
        wanted: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_attribute() {
        let err = WrapError::QuerySize {
            attr: AttrId::new(0x1001),
            status: Status::new(-30),
        };
        let text = err.to_string();
        assert!(text.contains("0x1001"));
        assert!(text.contains("-30"));
    }

    #[test]
    fn release_error_names_the_handle() {
        let err = WrapError::Release {
            handle: NativeHandle::new(0x2000),
            status: Status::new(-5),
        };
        assert!(err.to_string().contains("0x2000"));
    }
}
