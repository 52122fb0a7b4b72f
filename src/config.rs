//! Server configuration.

use crate::connection::{ConnectionLimits, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_ITEM_SIZE};
use crate::queue::StorageMode;
use std::path::PathBuf;
use std::time::Duration;

/// How long the accept loop waits before re-checking for shutdown
pub const DEFAULT_ACCEPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory holding queue data
    pub data_dir: PathBuf,
    /// One keyspace per queue, or one shared keyspace
    pub storage_mode: StorageMode,
    /// Time a client may take to send a command line
    pub idle_timeout: Duration,
    /// Accept loop poll interval
    pub accept_timeout: Duration,
    /// Largest SET data block accepted
    pub max_item_size: u32,
    /// GET opens queues that do not exist yet
    pub create_on_get: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            data_dir: PathBuf::from("./data"),
            storage_mode: StorageMode::Isolated,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            accept_timeout: DEFAULT_ACCEPT_TIMEOUT,
            max_item_size: DEFAULT_MAX_ITEM_SIZE,
            create_on_get: false,
        }
    }
}

impl ServerConfig {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connection_limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            idle_timeout: self.idle_timeout,
            max_item_size: self.max_item_size,
        }
    }
}
