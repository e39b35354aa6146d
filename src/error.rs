//! Error taxonomy for the index engine.
//!
//! Every fallible public operation returns [`IndexResult<T>`]. Variants map
//! one-to-one onto the observable error kinds of the engine's contract;
//! callers are expected to match on the enum rather than inspect a status
//! code.

use thiserror::Error;

/// Errors produced by index engine operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// `rid.page == 0`; a RID naming the pager's reserved page is never viable.
    #[error("inviable rid: page 0 cannot host a record")]
    InviableRid,

    /// A null/absent key was passed where a key is required.
    #[error("null key pointer")]
    NullPointer,

    /// `insert_entry` found the exact `(key, rid)` pair already present.
    #[error("entry already exists")]
    EntryExists,

    /// `delete_entry` found no matching `(key, rid)` pair.
    #[error("entry not found")]
    EntryNotFound,

    /// `attr_type`/`attr_length` out of range at index-creation time.
    #[error("invalid attribute specification")]
    InvalidAttr,

    /// A scan was opened on a handle that already has one open.
    #[error("scan already open")]
    ScanOpen,

    /// An operation requiring an open scan was called without one.
    #[error("scan is not open")]
    ScanClosed,

    /// `open` was called on a handle that is already open.
    #[error("file already open")]
    FileOpen,

    /// An operation requiring an open file was called on a closed handle.
    #[error("file is not open")]
    FileClosed,

    /// Scan exhausted; no more entries satisfy the predicate.
    #[error("end of scan")]
    IxEof,

    /// An invariant the engine relies on was found broken. In debug builds
    /// this also fires a `debug_assert!` before the error is constructed.
    #[error("internal invariant violation: {0}")]
    Internal(String),

    /// Propagated pager I/O failure.
    #[error("pager I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the engine.
pub type IndexResult<T> = Result<T, IndexError>;

impl IndexError {
    /// Build an [`IndexError::Internal`], asserting in debug builds first.
    ///
    /// Use this at every point the algorithm relies on an invariant (I1)-(I5)
    /// holding; in release builds it degrades to a returned error rather than
    /// a panic, per the error handling design.
    pub fn invariant(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        debug_assert!(false, "invariant violation: {msg}");
        IndexError::Internal(msg)
    }
}
