//! Storage Module
//!
//! This module provides the durability substrate for Vida's queues: an
//! ordered key-value store interface plus two implementations.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  OrderedStore (trait)                       │
//! │     get / set / delete / snapshot / sync                    │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!                ▼                              ▼
//!   ┌─────────────────────────┐    ┌─────────────────────────┐
//!   │       FjallStore        │    │       MemoryStore       │
//!   │  fjall keyspace on disk │    │  BTreeMap, copy-on-write│
//!   │  (production)           │    │  snapshots (tests)      │
//!   └─────────────────────────┘    └─────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use vida::storage::{KeyRange, MemoryStore, OrderedStore};
//!
//! let store = MemoryStore::new();
//! store.set(b"orders/1", b"hello").unwrap();
//!
//! let snapshot = store.snapshot();
//! let first = snapshot.first_key(&KeyRange::prefix(b"orders/")).unwrap();
//! assert_eq!(first, Some(b"orders/1".to_vec()));
//! ```

pub mod disk;
pub mod memory;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use disk::FjallStore;
pub use memory::MemoryStore;
pub use store::{prefix_limit, KeyRange, OrderedStore, StoreError, StoreResult, StoreSnapshot};
