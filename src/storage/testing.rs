//! Failure-injecting store for tests.

use crate::storage::memory::MemoryStore;
use crate::storage::store::{OrderedStore, StoreError, StoreResult, StoreSnapshot};
use bytes::Bytes;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// A [`MemoryStore`] whose writes can be made to fail, either all of them or
/// only those under one key prefix.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    fail_prefix: Mutex<Option<Vec<u8>>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_prefix(&self, prefix: &[u8]) {
        *self.fail_prefix.lock().unwrap() = Some(prefix.to_vec());
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self, key: &[u8]) -> StoreResult<()> {
        let poisoned = self
            .fail_prefix
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|prefix| key.starts_with(prefix));
        if poisoned || self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "disk full",
            )));
        }
        Ok(())
    }
}

impl OrderedStore for FlakyStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        self.inner.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.check(key)?;
        self.inner.set(key, value)
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        self.check(key)?;
        self.inner.delete(key)
    }

    fn snapshot(&self) -> Box<dyn StoreSnapshot> {
        self.inner.snapshot()
    }

    fn sync(&self) -> StoreResult<()> {
        self.inner.sync()
    }
}
