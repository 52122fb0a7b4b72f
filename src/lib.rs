//! # Vida - A Persistent FIFO Message Queue Server
//!
//! Vida is a disk-persistent message queue speaking a memcached-style text
//! protocol. Producers `SET` items into named queues, consumers `GET` them
//! back in FIFO order, and everything survives a restart.
//!
//! ## Features
//!
//! - **memcached-compatible**: Any memcached client can produce and consume
//! - **Persistent**: Every item lives in a fjall LSM-tree keyspace on disk
//! - **Fan-out**: `SET a+b+c` writes one item to several queues at once
//! - **Per-queue locking**: Queues never wait on each other
//! - **Async I/O**: Built on Tokio for handling thousands of concurrent connections
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                 Vida                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (accept +   │    │  Handler    │    │  Handler    │                  │
//! │  │  JoinSet)   │    └─────────────┘    └──────┬──────┘                  │
//! │  └─────────────┘           │                  │                         │
//! │                            ▼                  ▼                         │
//! │                     ┌─────────────┐    ┌──────────────────────────────┐ │
//! │                     │ Line Parser │    │        QueueRegistry         │ │
//! │                     └─────────────┘    │  ┌───────┐ ┌───────┐ ┌─────┐ │ │
//! │                                        │  │Queue  │ │Queue  │ │ ... │ │ │
//! │                                        │  │RwLock │ │RwLock │ │     │ │ │
//! │                                        │  └───┬───┘ └───┬───┘ └─────┘ │ │
//! │                                        └──────┼─────────┼─────────────┘ │
//! │                                               ▼         ▼               │
//! │                                        ┌──────────────────────────────┐ │
//! │                                        │   OrderedStore (fjall)       │ │
//! │                                        └──────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use vida::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     let handle = server.start()?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `SET <queue>[+<queue>...] <flags> <exptime> <bytes>` followed by the data block
//! - `GET <queue>[/peek] [<consumer-group>]`
//! - `GETS <queue>[/peek] [<consumer-group>]`
//! - `DELETE <queue>`
//! - `STATS`
//! - `VERSION`
//! - `QUIT`
//!
//! ## Module Overview
//!
//! - [`storage`]: Ordered key-value store interface, fjall and in-memory backends
//! - [`queue`]: Persistent FIFO queues and the queue registry
//! - [`protocol`]: Command line parser, reply serializer, wire errors
//! - [`commands`]: Command execution against the registry
//! - [`connection`]: Per-client framing, timeouts and statistics
//! - [`server`]: Listener, accept loop and graceful shutdown
//!
//! ## Design Highlights
//!
//! ### No Metadata Records
//!
//! A queue's head and tail are never written to disk. Item keys are 8-byte
//! big-endian ids, so opening a queue only needs the first and last key of
//! its range, read from a single snapshot.
//!
//! ### Key-Prefix Sharding
//!
//! In shared mode every queue stores its items under `name/` in one
//! keyspace. `/` is not a legal name character, so no queue's range can
//! overlap another's.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod queue;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::ServerConfig;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Command, ProtocolError, Response};
pub use queue::{Queue, QueueError, QueueRegistry, StorageMode};
pub use server::{Server, ServerError, ServerHandle};
pub use storage::{FjallStore, MemoryStore, OrderedStore};

/// The default port Vida listens on
pub const DEFAULT_PORT: u16 = 22133;

/// The default host Vida binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of Vida
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
