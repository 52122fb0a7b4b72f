//! In-Memory Ordered Store
//!
//! A `BTreeMap`-backed [`OrderedStore`] used by tests and benchmarks, and by
//! anyone embedding the queue engine without needing durability.
//!
//! ## Snapshots
//!
//! The map lives behind an `Arc` inside an `RwLock`. Taking a snapshot
//! clones the `Arc` (O(1)); writers call `Arc::make_mut`, which copies the
//! map only while a snapshot is still alive. The snapshot therefore never
//! observes writes made after it was taken.
//!
//! ```text
//! writer ──> RwLock<Arc<BTreeMap>> ──clone Arc──> MemorySnapshot
//!                  │
//!                  └─ make_mut: copy-on-write if a snapshot holds the Arc
//! ```

use crate::storage::store::{KeyRange, OrderedStore, StoreResult, StoreSnapshot};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

type Map = BTreeMap<Vec<u8>, Bytes>;

/// A thread-safe, ordered, in-memory key-value store.
///
/// # Example
///
/// ```
/// use vida::storage::{MemoryStore, OrderedStore};
///
/// let store = MemoryStore::new();
/// store.set(b"key", b"value").unwrap();
/// assert_eq!(store.get(b"key").unwrap().as_deref(), Some(&b"value"[..]));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Arc<Map>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys currently stored.
    pub fn len(&self) -> usize {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OrderedStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut data).insert(key.to_vec(), Bytes::copy_from_slice(value));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        if data.contains_key(key) {
            Arc::make_mut(&mut data).remove(key);
        }
        Ok(())
    }

    fn snapshot(&self) -> Box<dyn StoreSnapshot> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Box::new(MemorySnapshot {
            data: Arc::clone(&data),
        })
    }

    fn sync(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// A frozen view of a [`MemoryStore`].
#[derive(Debug)]
pub struct MemorySnapshot {
    data: Arc<Map>,
}

impl StoreSnapshot for MemorySnapshot {
    fn first_key(&self, range: &KeyRange) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .data
            .range::<[u8], _>(range.bounds())
            .next()
            .map(|(key, _)| key.clone()))
    }

    fn last_key(&self, range: &KeyRange) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .data
            .range::<[u8], _>(range.bounds())
            .next_back()
            .map(|(key, _)| key.clone()))
    }
}
