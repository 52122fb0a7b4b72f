//! Queue error types.

use crate::storage::StoreError;
use thiserror::Error;

/// Errors produced by the queue engine and the queue registry.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Nothing to dequeue (head == tail)
    #[error("queue: is empty")]
    IsEmpty,

    /// Requested id is not between head (exclusive) and tail (inclusive)
    #[error("queue: ID {0} is out of bounds")]
    IdOutOfBounds(u64),

    /// Name contains characters outside `[A-Za-z0-9_\-:]`, or is empty
    #[error("queue: name is not alphanumeric")]
    InvalidName,

    /// Name is longer than the allowed limit
    #[error("queue: name is too long")]
    NameTooLong,

    /// Lookup without creation found no such queue
    #[error("queue: {0} does not exist")]
    NotFound(String),

    /// The tail already sits at the largest representable id
    #[error("queue: is full")]
    Full,

    /// Operation attempted after `close()`
    #[error("queue: is closed")]
    Closed,

    /// A key inside the queue's range does not decode to an item id
    #[error("queue: corrupt key {0:02x?}")]
    CorruptKey(Vec<u8>),

    /// The store lost an item the queue still accounts for
    #[error("queue: item {0} is missing from the store")]
    MissingItem(u64),

    /// The underlying store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;
