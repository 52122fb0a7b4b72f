//! Queue Registry
//!
//! The registry maps queue names to live [`Queue`] instances and opens them
//! on first use. It guarantees at most one open instance per name, so every
//! connection touching `orders` goes through the same head/tail cursor.
//!
//! ## Storage Modes
//!
//! ```text
//! Isolated (default)                  Shared
//!
//! <data_dir>/                         <data_dir>/   (one keyspace)
//! ├── orders/   keyspace              ├── orders/00..01
//! ├── events/   keyspace              ├── orders/00..02
//! └── jobs/     keyspace              └── events/00..01
//! ```
//!
//! In isolated mode each queue owns its keyspace and syncs it on close. In
//! shared mode the registry owns one store and hands every queue a weak
//! reference plus a `name/` key prefix.
//!
//! The registry mutex is held only for lookup-or-create. Queue operations
//! run on the returned `Arc<Queue>` without touching it.

use crate::queue::engine::{Queue, QueueOptions};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::key::{shared_prefix, validate_name};
use crate::storage::{FjallStore, KeyRange, OrderedStore, StoreError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Where queues keep their items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageMode {
    /// One keyspace per queue under `<data_dir>/<name>`
    #[default]
    Isolated,
    /// A single keyspace at `<data_dir>`, queues separated by key prefix
    Shared,
}

enum Backend {
    Isolated,
    Shared(Arc<dyn OrderedStore>),
}

/// Name → queue map with lazy opening.
pub struct QueueRegistry {
    queues: Mutex<HashMap<String, Arc<Queue>>>,
    data_path: PathBuf,
    backend: Backend,
}

impl std::fmt::Debug for QueueRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueRegistry")
            .field("data_path", &self.data_path)
            .field("mode", &self.mode())
            .field("queues", &self.len())
            .finish()
    }
}

impl QueueRegistry {
    /// Creates a registry rooted at `data_dir`, creating the directory if
    /// needed. In shared mode the common store is opened right away.
    pub fn open(data_dir: impl AsRef<Path>, mode: StorageMode) -> QueueResult<Self> {
        let data_path = std::path::absolute(data_dir.as_ref()).map_err(StoreError::from)?;
        std::fs::create_dir_all(&data_path).map_err(StoreError::from)?;

        let backend = match mode {
            StorageMode::Isolated => Backend::Isolated,
            StorageMode::Shared => Backend::Shared(Arc::new(FjallStore::open(&data_path)?)),
        };

        info!(path = %data_path.display(), ?mode, "Queue registry ready");

        Ok(Self {
            queues: Mutex::new(HashMap::new()),
            data_path,
            backend,
        })
    }

    /// Creates a shared-mode registry over an existing store.
    pub fn with_shared_store(data_dir: impl AsRef<Path>, store: Arc<dyn OrderedStore>) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            data_path: data_dir.as_ref().to_path_buf(),
            backend: Backend::Shared(store),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Queue>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the queue named `name`, opening it if necessary.
    ///
    /// Open failures propagate and are not cached; the next call retries.
    pub fn get_or_create(&self, name: &str) -> QueueResult<Arc<Queue>> {
        let mut queues = self.lock();
        if let Some(queue) = queues.get(name) {
            return Ok(Arc::clone(queue));
        }

        let queue = Arc::new(self.open_queue(name)?);
        queues.insert(name.to_string(), Arc::clone(&queue));

        debug!(queue = %name, open = queues.len(), "Registered queue");
        Ok(queue)
    }

    /// Returns the queue named `name` only if it already exists, either open
    /// in this registry or persisted by an earlier run.
    pub fn resolve(&self, name: &str) -> QueueResult<Arc<Queue>> {
        validate_name(name)?;

        let mut queues = self.lock();
        if let Some(queue) = queues.get(name) {
            return Ok(Arc::clone(queue));
        }

        if !self.exists_on_disk(name)? {
            return Err(QueueError::NotFound(name.to_string()));
        }

        let queue = Arc::new(self.open_queue(name)?);
        queues.insert(name.to_string(), Arc::clone(&queue));
        Ok(queue)
    }

    fn exists_on_disk(&self, name: &str) -> QueueResult<bool> {
        match &self.backend {
            Backend::Isolated => Ok(self.data_path.join(name).is_dir()),
            Backend::Shared(store) => {
                let range = KeyRange::prefix(&shared_prefix(name));
                Ok(store.snapshot().first_key(&range)?.is_some())
            }
        }
    }

    fn open_queue(&self, name: &str) -> QueueResult<Queue> {
        match &self.backend {
            Backend::Isolated => Queue::open(name, &self.data_path, QueueOptions::default()),
            Backend::Shared(store) => {
                Queue::open_shared(name, store, QueueOptions::with_prefix(shared_prefix(name)))
            }
        }
    }

    /// A sorted snapshot of the currently open queues.
    pub fn queues(&self) -> Vec<Arc<Queue>> {
        let mut queues: Vec<Arc<Queue>> = self.lock().values().cloned().collect();
        queues.sort_by(|a, b| a.name().cmp(b.name()));
        queues
    }

    /// Number of open queues.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mode(&self) -> StorageMode {
        match self.backend {
            Backend::Isolated => StorageMode::Isolated,
            Backend::Shared(_) => StorageMode::Shared,
        }
    }

    /// Absolute path of the data directory.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Closes every open queue, then syncs the shared store.
    ///
    /// Every queue is attempted even if one fails; the first error is
    /// returned.
    pub fn close(&self) -> QueueResult<()> {
        let queues: Vec<Arc<Queue>> = self.lock().drain().map(|(_, queue)| queue).collect();
        let mut result = Ok(());

        for queue in &queues {
            if let Err(e) = queue.close() {
                warn!(queue = %queue.name(), error = %e, "Failed to close queue");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        if let Backend::Shared(store) = &self.backend {
            if let Err(e) = store.sync() {
                warn!(error = %e, "Failed to sync shared store");
                if result.is_ok() {
                    result = Err(e.into());
                }
            }
        }

        info!(closed = queues.len(), "Queue registry closed");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::thread;

    fn shared_registry() -> QueueRegistry {
        QueueRegistry::with_shared_store("/unused", Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_get_or_create_returns_same_instance() {
        let registry = shared_registry();
        let a = registry.get_or_create("orders").unwrap();
        let b = registry.get_or_create("orders").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_or_create_rejects_bad_names() {
        let registry = shared_registry();
        assert!(matches!(
            registry.get_or_create("no spaces"),
            Err(QueueError::InvalidName)
        ));
        assert!(matches!(
            registry.get_or_create(&"q".repeat(101)),
            Err(QueueError::NameTooLong)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_get_or_create() {
        let registry = Arc::new(shared_registry());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.get_or_create("orders").unwrap())
            })
            .collect();

        let queues: Vec<Arc<Queue>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for queue in &queues[1..] {
            assert!(Arc::ptr_eq(&queues[0], queue));
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_queue() {
        let registry = shared_registry();
        assert!(matches!(
            registry.resolve("missing"),
            Err(QueueError::NotFound(name)) if name == "missing"
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolve_finds_persisted_shared_queue() {
        let store: Arc<dyn OrderedStore> = Arc::new(MemoryStore::new());
        {
            let registry = QueueRegistry::with_shared_store("/unused", Arc::clone(&store));
            registry.get_or_create("orders").unwrap().enqueue(b"x").unwrap();
            registry.close().unwrap();
        }

        let registry = QueueRegistry::with_shared_store("/unused", store);
        let queue = registry.resolve("orders").unwrap();
        assert_eq!(queue.len(), 1);
        // A queue sharing the prefix start is still unknown
        assert!(matches!(registry.resolve("order"), Err(QueueError::NotFound(_))));
    }

    #[test]
    fn test_isolated_mode_on_disk() {
        let dir = tempfile::tempdir().unwrap();

        {
            let registry = QueueRegistry::open(dir.path(), StorageMode::Isolated).unwrap();
            assert!(registry.data_path().is_absolute());
            let queue = registry.get_or_create("orders").unwrap();
            queue.enqueue(b"one").unwrap();
            queue.enqueue(b"two").unwrap();
            registry.close().unwrap();
        }

        assert!(dir.path().join("orders").is_dir());

        let registry = QueueRegistry::open(dir.path(), StorageMode::Isolated).unwrap();
        assert!(matches!(registry.resolve("events"), Err(QueueError::NotFound(_))));

        let queue = registry.resolve("orders").unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(&queue.dequeue().unwrap().payload[..], b"one");
    }

    #[test]
    fn test_shared_mode_on_disk() {
        let dir = tempfile::tempdir().unwrap();

        {
            let registry = QueueRegistry::open(dir.path(), StorageMode::Shared).unwrap();
            registry.get_or_create("a").unwrap().enqueue(b"for a").unwrap();
            registry.get_or_create("ab").unwrap().enqueue(b"for ab").unwrap();
            registry.close().unwrap();
        }

        let registry = QueueRegistry::open(dir.path(), StorageMode::Shared).unwrap();
        assert_eq!(registry.mode(), StorageMode::Shared);

        let a = registry.resolve("a").unwrap();
        let ab = registry.resolve("ab").unwrap();
        assert_eq!((a.head(), a.tail()), (0, 1));
        assert_eq!((ab.head(), ab.tail()), (0, 1));
        assert_eq!(&a.dequeue().unwrap().payload[..], b"for a");
        assert_eq!(&ab.dequeue().unwrap().payload[..], b"for ab");
    }

    #[test]
    fn test_queues_sorted() {
        let registry = shared_registry();
        for name in ["zeta", "alpha", "mid"] {
            registry.get_or_create(name).unwrap();
        }
        let names: Vec<String> = registry.queues().iter().map(|q| q.name().to_string()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_close_closes_queues() {
        let registry = shared_registry();
        let queue = registry.get_or_create("orders").unwrap();
        registry.close().unwrap();

        assert!(!queue.is_open());
        assert!(registry.is_empty());
    }
}
