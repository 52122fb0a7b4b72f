//! Persistent FIFO Queue Engine
//!
//! A [`Queue`] maps a monotonically increasing sequence id to an opaque
//! payload. Items live in an [`OrderedStore`] under
//! `key_prefix || be_u64(id)`; the queue itself only keeps two counters in
//! memory:
//!
//! ```text
//!              head                      tail
//!               │                          │
//!   consumed    ▼   pending items          ▼   future ids
//! ──────────────┼──┬──┬──┬──┬──┬──┬──┬──┬──┼───────────────
//!   1 .. head   │h+1                     t │ t+1 ..
//! ──────────────┴──┴──┴──┴──┴──┴──┴──┴──┴──┴───────────────
//! ```
//!
//! A key exists in the store iff `head < id <= tail`.
//!
//! ## Reconstruction
//!
//! `head` and `tail` are never written to disk. Every open takes one store
//! snapshot and scans the queue's key range:
//!
//! - `head = first_id - 1`, or `0` when the range is empty
//! - `tail = last_id`, or `0` when the range is empty
//!
//! Both bounds come from the same snapshot, so a concurrent writer can never
//! leave them straddling a half-applied mutation.
//!
//! ## Locking
//!
//! Each queue owns one `RwLock` around its cursor. Enqueue, dequeue and
//! drain hold the write lock across the whole store read-modify-write;
//! depth and peek take the read lock. Queues never wait on each other.

use crate::queue::error::{QueueError, QueueResult};
use crate::queue::key::{item_key, key_to_id, validate_name};
use crate::storage::{FjallStore, KeyRange, OrderedStore, StoreError};
use bytes::Bytes;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tracing::{debug, trace};

/// An item taken from (or observed in) a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Sequence id assigned at enqueue time, starting at 1
    pub id: u64,
    /// The payload, byte-for-byte as enqueued
    pub payload: Bytes,
}

/// Options applied when opening a queue.
#[derive(Debug, Clone, Default)]
pub struct QueueOptions {
    /// Bytes prepended to every item key. Empty for a queue that owns its
    /// store; `name/` for a queue living in a shared store.
    pub key_prefix: Vec<u8>,
}

impl QueueOptions {
    pub fn with_prefix(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            key_prefix: prefix.into(),
        }
    }
}

/// How a queue reaches its store.
enum StoreHandle {
    /// The queue owns the store and syncs it on close.
    Owned(Arc<dyn OrderedStore>),
    /// The store belongs to someone else (the registry); the queue only
    /// borrows it for as long as the owner keeps it alive.
    Shared(Weak<dyn OrderedStore>),
}

impl StoreHandle {
    fn acquire(&self) -> QueueResult<Arc<dyn OrderedStore>> {
        match self {
            StoreHandle::Owned(store) => Ok(Arc::clone(store)),
            StoreHandle::Shared(store) => store
                .upgrade()
                .ok_or(QueueError::Store(StoreError::Closed)),
        }
    }
}

/// In-memory view of the queue bounds.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    head: u64,
    tail: u64,
    opened: bool,
}

impl Cursor {
    fn ensure_open(&self) -> QueueResult<()> {
        if self.opened {
            Ok(())
        } else {
            Err(QueueError::Closed)
        }
    }
}

/// A persistent FIFO queue.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vida::queue::{Queue, QueueOptions};
/// use vida::storage::MemoryStore;
///
/// let store = Arc::new(MemoryStore::new());
/// let queue = Queue::with_store("orders", store, QueueOptions::default()).unwrap();
///
/// assert_eq!(queue.enqueue(b"first").unwrap(), 1);
/// assert_eq!(queue.enqueue(b"second").unwrap(), 2);
/// assert_eq!(queue.len(), 2);
///
/// let item = queue.dequeue().unwrap();
/// assert_eq!(item.id, 1);
/// assert_eq!(&item.payload[..], b"first");
/// ```
pub struct Queue {
    name: String,
    key_prefix: Vec<u8>,
    range: KeyRange,
    store: StoreHandle,
    state: RwLock<Cursor>,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = *self.read_state();
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("shared", &self.is_shared())
            .field("head", &state.head)
            .field("tail", &state.tail)
            .field("opened", &state.opened)
            .finish()
    }
}

impl Queue {
    /// Opens a queue that owns a disk store rooted at `data_dir/name`.
    ///
    /// The name is validated before anything touches the filesystem.
    pub fn open(
        name: &str,
        data_dir: impl AsRef<Path>,
        options: QueueOptions,
    ) -> QueueResult<Self> {
        validate_name(name)?;
        let store = FjallStore::open(data_dir.as_ref().join(name))?;
        Self::attach(name, StoreHandle::Owned(Arc::new(store)), options)
    }

    /// Opens a queue inside a store shared with other queues.
    ///
    /// The queue keeps only a weak reference; the caller stays responsible
    /// for keeping the store alive and for syncing it at shutdown.
    pub fn open_shared(
        name: &str,
        store: &Arc<dyn OrderedStore>,
        options: QueueOptions,
    ) -> QueueResult<Self> {
        validate_name(name)?;
        Self::attach(name, StoreHandle::Shared(Arc::downgrade(store)), options)
    }

    /// Opens a queue that owns an arbitrary store.
    pub fn with_store(
        name: &str,
        store: Arc<dyn OrderedStore>,
        options: QueueOptions,
    ) -> QueueResult<Self> {
        validate_name(name)?;
        Self::attach(name, StoreHandle::Owned(store), options)
    }

    fn attach(name: &str, store: StoreHandle, options: QueueOptions) -> QueueResult<Self> {
        let queue = Self {
            name: name.to_string(),
            range: KeyRange::prefix(&options.key_prefix),
            key_prefix: options.key_prefix,
            store,
            state: RwLock::new(Cursor::default()),
        };
        queue.initialize()?;
        Ok(queue)
    }

    /// Rebuilds head and tail from a single snapshot of the key range.
    fn initialize(&self) -> QueueResult<()> {
        let store = self.store.acquire()?;
        let snapshot = store.snapshot();

        let head = match snapshot.first_key(&self.range)? {
            Some(key) => self.decode_id(&key)? - 1,
            None => 0,
        };
        let tail = match snapshot.last_key(&self.range)? {
            Some(key) => self.decode_id(&key)?,
            None => 0,
        };

        *self.write_state() = Cursor {
            head,
            tail,
            opened: true,
        };

        debug!(queue = %self.name, head, tail, shared = self.is_shared(), "Queue opened");
        Ok(())
    }

    fn decode_id(&self, key: &[u8]) -> QueueResult<u64> {
        match key_to_id(&self.key_prefix, key) {
            Some(id) if id > 0 => Ok(id),
            _ => Err(QueueError::CorruptKey(key.to_vec())),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Cursor> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Cursor> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `payload` and returns its id.
    ///
    /// The tail only moves once the store accepted the write, so a failed
    /// enqueue never burns an id.
    pub fn enqueue(&self, payload: &[u8]) -> QueueResult<u64> {
        let store = self.store.acquire()?;
        let mut state = self.write_state();
        state.ensure_open()?;

        let id = state.tail.checked_add(1).ok_or(QueueError::Full)?;
        store.set(&item_key(&self.key_prefix, id), payload)?;
        state.tail = id;

        trace!(queue = %self.name, id, bytes = payload.len(), "Enqueued item");
        Ok(id)
    }

    /// Removes and returns the oldest item.
    ///
    /// Read and delete happen under one write lock, so two callers can never
    /// both receive the same id.
    pub fn dequeue(&self) -> QueueResult<QueueItem> {
        let store = self.store.acquire()?;
        let mut state = self.write_state();
        state.ensure_open()?;

        if state.head == state.tail {
            return Err(QueueError::IsEmpty);
        }

        let id = state.head + 1;
        let key = item_key(&self.key_prefix, id);
        let payload = store.get(&key)?.ok_or(QueueError::MissingItem(id))?;
        store.delete(&key)?;
        state.head = id;

        trace!(queue = %self.name, id, bytes = payload.len(), "Dequeued item");
        Ok(QueueItem { id, payload })
    }

    /// Returns the oldest item without removing it.
    pub fn peek(&self) -> QueueResult<QueueItem> {
        let head = {
            let state = self.read_state();
            state.ensure_open()?;
            if state.head == state.tail {
                return Err(QueueError::IsEmpty);
            }
            state.head
        };
        self.get(head + 1)
    }

    /// Returns the pending item with the given id.
    pub fn get(&self, id: u64) -> QueueResult<QueueItem> {
        let store = self.store.acquire()?;
        let state = self.read_state();
        state.ensure_open()?;

        if id <= state.head || id > state.tail {
            return Err(QueueError::IdOutOfBounds(id));
        }

        let payload = store
            .get(&item_key(&self.key_prefix, id))?
            .ok_or(QueueError::MissingItem(id))?;
        Ok(QueueItem { id, payload })
    }

    /// Deletes every pending item and returns how many were removed.
    ///
    /// Ids are not handed out again: the tail stays where it was. If a
    /// delete fails, the head stops at the last item actually removed.
    pub fn drain(&self) -> QueueResult<u64> {
        let store = self.store.acquire()?;
        let mut state = self.write_state();
        state.ensure_open()?;

        let mut drained = 0;
        while state.head < state.tail {
            let id = state.head + 1;
            store.delete(&item_key(&self.key_prefix, id))?;
            state.head = id;
            drained += 1;
        }

        debug!(queue = %self.name, drained, "Queue drained");
        Ok(drained)
    }

    /// Marks the queue closed. An owned store is synced to disk; a shared
    /// store is left to its owner.
    pub fn close(&self) -> QueueResult<()> {
        let mut state = self.write_state();
        if !state.opened {
            return Ok(());
        }
        state.opened = false;

        if let StoreHandle::Owned(store) = &self.store {
            store.sync()?;
        }

        debug!(queue = %self.name, "Queue closed");
        Ok(())
    }

    /// Number of pending items (`tail - head`).
    pub fn len(&self) -> u64 {
        let state = self.read_state();
        state.tail - state.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id of the last consumed item.
    pub fn head(&self) -> u64 {
        self.read_state().head
    }

    /// Id of the last produced item.
    pub fn tail(&self) -> u64 {
        self.read_state().tail
    }

    pub fn is_open(&self) -> bool {
        self.read_state().opened
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_prefix(&self) -> &[u8] {
        &self.key_prefix
    }

    /// Returns true if the queue lives in a store shared with other queues.
    pub fn is_shared(&self) -> bool {
        matches!(self.store, StoreHandle::Shared(_))
    }
}
