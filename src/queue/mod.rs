//! Queue Module
//!
//! Persistent FIFO queues and the registry that hands them out by name.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      QueueRegistry                        │
//! │        Mutex<HashMap<String, Arc<Queue>>>                 │
//! └──────────┬──────────────────┬──────────────────┬──────────┘
//!            │                  │                  │
//!            ▼                  ▼                  ▼
//!     ┌────────────┐     ┌────────────┐     ┌────────────┐
//!     │   Queue    │     │   Queue    │     │   Queue    │
//!     │  RwLock    │     │  RwLock    │     │  RwLock    │
//!     │ head..tail │     │ head..tail │     │ head..tail │
//!     └─────┬──────┘     └─────┬──────┘     └─────┬──────┘
//!           │                  │                  │
//!           ▼                  ▼                  ▼
//!      OrderedStore       OrderedStore       OrderedStore
//!      (isolated: one per queue, shared: one for all)
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use vida::queue::QueueRegistry;
//! use vida::storage::MemoryStore;
//!
//! let registry = QueueRegistry::with_shared_store("/tmp/unused", Arc::new(MemoryStore::new()));
//!
//! let orders = registry.get_or_create("orders").unwrap();
//! orders.enqueue(b"hello").unwrap();
//!
//! let same = registry.resolve("orders").unwrap();
//! assert_eq!(same.dequeue().unwrap().payload.as_ref(), b"hello");
//! ```

pub mod engine;
pub mod error;
pub mod key;
pub mod registry;

pub use engine::{Queue, QueueItem, QueueOptions};
pub use error::{QueueError, QueueResult};
pub use key::{validate_name, MAX_NAME_LEN};
pub use registry::{QueueRegistry, StorageMode};
