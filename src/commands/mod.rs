//! Command Handler Module
//!
//! This module implements the command processing layer for Vida.
//! It receives parsed commands, executes them against the queue registry,
//! and returns the replies.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ QueueRegistry   │  (queue module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `SET`, `GET`, `GETS`
//! - `DELETE`, `STATS`, `VERSION`, `QUIT`

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
