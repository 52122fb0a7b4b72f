//! Disk-Backed Ordered Store
//!
//! [`FjallStore`] adapts a fjall keyspace to the [`OrderedStore`] interface.
//! Each store owns one keyspace directory holding a single partition,
//! `items`, where every queue item lives.
//!
//! ```text
//! <path>/
//! ├── journals/          write-ahead journal (fjall)
//! ├── partitions/items/  sorted runs of the `items` partition
//! └── ...
//! ```
//!
//! Compaction, journaling and caching are fjall's business; this module only
//! maps the five store operations onto the partition handle.

use crate::storage::store::{KeyRange, OrderedStore, StoreResult, StoreSnapshot};
use bytes::Bytes;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the partition holding queue items.
pub const ITEMS_PARTITION: &str = "items";

/// A persistent [`OrderedStore`] backed by a fjall keyspace.
pub struct FjallStore {
    keyspace: Keyspace,
    items: PartitionHandle,
    path: PathBuf,
}

impl std::fmt::Debug for FjallStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FjallStore")
            .field("path", &self.path)
            .finish()
    }
}

impl FjallStore {
    /// Opens (or creates) a store rooted at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;

        let keyspace = fjall::Config::new(&path).open()?;
        let items = keyspace.open_partition(ITEMS_PARTITION, PartitionCreateOptions::default())?;

        debug!(path = %path.display(), "Opened keyspace");

        Ok(Self {
            keyspace,
            items,
            path,
        })
    }

    /// The directory this store lives in.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OrderedStore for FjallStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        Ok(self
            .items
            .get(key)?
            .map(|value| Bytes::copy_from_slice(&value)))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.items.insert(key, value)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        self.items.remove(key)?;
        Ok(())
    }

    fn snapshot(&self) -> Box<dyn StoreSnapshot> {
        Box::new(FjallSnapshot {
            inner: self.items.snapshot(),
        })
    }

    fn sync(&self) -> StoreResult<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

/// A point-in-time view of the `items` partition.
pub struct FjallSnapshot {
    inner: fjall::Snapshot,
}

impl StoreSnapshot for FjallSnapshot {
    fn first_key(&self, range: &KeyRange) -> StoreResult<Option<Vec<u8>>> {
        match self.inner.range::<&[u8], _>(range.bounds()).next() {
            Some(entry) => {
                let (key, _) = entry.map_err(fjall::Error::from)?;
                Ok(Some(key.to_vec()))
            }
            None => Ok(None),
        }
    }

    fn last_key(&self, range: &KeyRange) -> StoreResult<Option<Vec<u8>>> {
        match self.inner.range::<&[u8], _>(range.bounds()).next_back() {
            Some(entry) => {
                let (key, _) = entry.map_err(fjall::Error::from)?;
                Ok(Some(key.to_vec()))
            }
            None => Ok(None),
        }
    }
}
