//! Ordered Key-Value Store Interface
//!
//! Every queue persists its items through the [`OrderedStore`] trait. The
//! queue engine never talks to a concrete storage engine directly, it only
//! needs five things from the store:
//!
//! - point `get` / `set` / `delete`
//! - a point-in-time [`StoreSnapshot`] with forward/backward range access
//! - `sync` to push buffered writes to disk at shutdown
//!
//! ## Key Ranges
//!
//! Several queues may share one store, each owning every key that starts
//! with its own prefix. A [`KeyRange`] is the half-open interval
//! `[prefix, limit)` where `limit` is the smallest byte string greater than
//! every string starting with `prefix`:
//!
//! ```text
//! prefix          limit
//! [01 FF]    ->   [02]          increment last non-0xFF byte, truncate
//! [6F 2F]    ->   [6F 30]
//! [FF FF]    ->   (unbounded)   nothing to increment
//! []         ->   (unbounded)
//! ```

use bytes::Bytes;
use std::ops::Bound;
use thiserror::Error;

/// Errors raised by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying LSM engine failed
    #[error("storage engine error: {0}")]
    Engine(#[from] fjall::Error),

    /// Filesystem error (creating directories, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store was released by its owner while a handle was still in use
    #[error("store is closed")]
    Closed,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Computes the exclusive upper bound of the key range sharing `prefix`.
///
/// Returns `None` when no such bound exists (empty prefix, or a prefix made
/// only of `0xFF` bytes). In that case every key `>= prefix` starts with
/// `prefix`, so scanning without an upper bound stays inside the namespace.
pub fn prefix_limit(prefix: &[u8]) -> Option<Vec<u8>> {
    let last = prefix.iter().rposition(|&b| b < 0xFF)?;
    let mut limit = prefix[..=last].to_vec();
    limit[last] += 1;
    Some(limit)
}

/// A half-open key interval `[lower, upper)`; `upper == None` is unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    lower: Vec<u8>,
    upper: Option<Vec<u8>>,
}

impl KeyRange {
    /// The range of every key starting with `prefix`.
    pub fn prefix(prefix: &[u8]) -> Self {
        Self {
            lower: prefix.to_vec(),
            upper: prefix_limit(prefix),
        }
    }

    pub fn lower(&self) -> &[u8] {
        &self.lower
    }

    pub fn upper(&self) -> Option<&[u8]> {
        self.upper.as_deref()
    }

    /// Returns true if `key` falls inside the range.
    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.lower.as_slice() && self.upper.as_deref().map_or(true, |upper| key < upper)
    }

    /// The range as a pair of `Bound`s, usable with `BTreeMap::range` and
    /// fjall range iterators.
    pub fn bounds(&self) -> (Bound<&[u8]>, Bound<&[u8]>) {
        let upper = match &self.upper {
            Some(upper) => Bound::Excluded(upper.as_slice()),
            None => Bound::Unbounded,
        };
        (Bound::Included(self.lower.as_slice()), upper)
    }
}

/// A consistent, read-only view of the store at one point in time.
///
/// Writes that happen after the snapshot was taken are not visible through it.
pub trait StoreSnapshot {
    /// The smallest key inside `range`.
    fn first_key(&self, range: &KeyRange) -> StoreResult<Option<Vec<u8>>>;

    /// The largest key inside `range`.
    fn last_key(&self, range: &KeyRange) -> StoreResult<Option<Vec<u8>>>;
}

/// Durable, sorted byte-key storage.
///
/// Implementations must be safe to share across threads; the queue engine
/// serializes its own read-modify-write sequences with a per-queue lock.
pub trait OrderedStore: Send + Sync {
    /// Reads the value stored under `key`.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Bytes>>;

    /// Writes `value` under `key`, replacing any previous value.
    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn delete(&self, key: &[u8]) -> StoreResult<()>;

    /// Opens a point-in-time snapshot.
    fn snapshot(&self) -> Box<dyn StoreSnapshot>;

    /// Flushes buffered writes to durable storage.
    fn sync(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_limit_increments_last_byte() {
        assert_eq!(prefix_limit(b"orders/"), Some(b"orders0".to_vec()));
        assert_eq!(prefix_limit(&[0x01, 0x02]), Some(vec![0x01, 0x03]));
    }

    #[test]
    fn test_prefix_limit_truncates_trailing_ff() {
        assert_eq!(prefix_limit(&[0x01, 0xFF]), Some(vec![0x02]));
        assert_eq!(prefix_limit(&[0x01, 0xFE, 0xFF, 0xFF]), Some(vec![0x01, 0xFF]));
    }

    #[test]
    fn test_prefix_limit_unbounded() {
        assert_eq!(prefix_limit(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_limit(&[]), None);
    }

    #[test]
    fn test_key_range_contains() {
        let range = KeyRange::prefix(b"a/");
        assert!(range.contains(b"a/"));
        assert!(range.contains(b"a/\x00\x00\x00\x00\x00\x00\x00\x01"));
        assert!(!range.contains(b"ab/\x00"));
        assert!(!range.contains(b"a"));
        assert!(!range.contains(b"a0"));
    }

    #[test]
    fn test_key_range_all_ff_prefix_stays_in_namespace() {
        let range = KeyRange::prefix(&[0xFF, 0xFF]);
        assert_eq!(range.upper(), None);
        assert!(range.contains(&[0xFF, 0xFF, 0x00]));
        assert!(!range.contains(&[0xFF, 0xFE, 0xFF]));
    }

    #[test]
    fn test_key_range_empty_prefix_is_everything() {
        let range = KeyRange::prefix(&[]);
        assert!(range.contains(&[]));
        assert!(range.contains(&[0x00]));
        assert!(range.contains(&[0xFF; 9]));
    }
}
