//! Error types for the collection structures.
//!
//! These are invariant violations, not runtime conditions: a duplicate
//! identity, an out-of-range position, or a cursor from a replaced adapter
//! means an upstream contract was broken, and the failure is surfaced
//! immediately instead of being papered over. Expected absences (an unknown
//! identity) are `None` returns, never errors.

use swarmview_core::TorrentId;
use thiserror::Error;

/// Primary error type for collection operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectionError {
    /// An entity with this identity is already stored.
    #[error("duplicate torrent identity")]
    DuplicateIdentity {
        /// The colliding identity.
        id: TorrentId,
    },
    /// A positional operation referenced a slot that does not exist.
    #[error("position out of bounds")]
    PositionOutOfBounds {
        /// Requested position.
        position: usize,
        /// Current collection length.
        len: usize,
    },
    /// A splice's replacement run would break the ascending-identity order.
    #[error("splice breaks identity order")]
    UnorderedSplice {
        /// Identity at which the order violation was detected.
        id: TorrentId,
    },
    /// A cursor outlived the adapter generation it was minted for.
    #[error("stale cursor")]
    StaleCursor {
        /// Stamp carried by the cursor.
        cursor_stamp: u64,
        /// Stamp of the current adapter generation.
        adapter_stamp: u64,
    },
}

/// Convenience alias for collection operation results.
pub type CollectionResult<T> = Result<T, CollectionError>;
