//! Error types for the storage engine.
//!
//! Errors divide into four classes: operational (`Io`), structural
//! (`PageFormat`, `IndexCorrupt`), contract (`Duplicate`,
//! `DuplicateCacheEntry`, `BadFormat`, `IllegalOperation`), and lifecycle
//! (`PageExpired`, `CachePinned`). No variant is ever swallowed or turned
//! into a success; every boundary surfaces its error as-is.

use thiserror::Error;

use crate::types::PageId;

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the storage engine.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error from the underlying file system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A page's on-disk bytes do not parse as a valid page of the expected
    /// family (bad magic, unknown page type, truncated header).
    #[error("page format error at page {page_id}: {reason}")]
    PageFormat { page_id: PageId, reason: String },

    /// A structural violation discovered opportunistically while walking
    /// the tree (empty node during descent, sort-order violation during a
    /// move, broken leaf chain).
    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    /// Insert on a unique index found the key already present.
    #[error("duplicate key on unique index")]
    Duplicate,

    /// A value failed to parse from its string form, or overflowed its
    /// declared kind.
    #[error("bad format: {0}")]
    BadFormat(String),

    /// An access went through a handle to a page expired via
    /// `expel_all_for_resource`.
    #[error("page {0} expired")]
    PageExpired(PageId),

    /// Eviction needed a victim but every candidate page was pinned.
    #[error("cache pinned: no evictable page available")]
    CachePinned,

    /// `add_page` was asked to insert a `(resource, page)` key that is
    /// already resident.
    #[error("cache entry for page {0} already present")]
    DuplicateCacheEntry(PageId),

    /// The caller asked for an operation the kind/page/cursor does not
    /// support (arithmetic on a non-arithmetic kind, `find_child` on a
    /// leaf, RID parsed from a string).
    #[error("illegal operation: {0}")]
    IllegalOperation(String),

    /// Requested page was not present and could not be faulted in.
    #[error("page {0} not found")]
    PageNotFound(PageId),

    /// A leaf or inner node has no room for a new entry of the given size.
    #[error("page {page_id} is full: needed {needed} bytes, {available} available")]
    PageFull {
        page_id: PageId,
        needed: usize,
        available: usize,
    },

    /// The index file's resource header failed validation.
    #[error("invalid index file: {0}")]
    InvalidIndexFile(String),

    /// Buffer pool has no available frames and the cache could not evict.
    #[error("buffer pool exhausted: no available frames")]
    BufferPoolExhausted,
}

impl StorageError {
    pub fn page_format(page_id: PageId, reason: impl Into<String>) -> Self {
        Self::PageFormat {
            page_id,
            reason: reason.into(),
        }
    }

    pub fn index_corrupt(msg: impl Into<String>) -> Self {
        Self::IndexCorrupt(msg.into())
    }

    pub fn bad_format(msg: impl Into<String>) -> Self {
        Self::BadFormat(msg.into())
    }

    pub fn illegal_operation(msg: impl Into<String>) -> Self {
        Self::IllegalOperation(msg.into())
    }

    pub fn invalid_index_file(msg: impl Into<String>) -> Self {
        Self::InvalidIndexFile(msg.into())
    }
}
