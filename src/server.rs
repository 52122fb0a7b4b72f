//! TCP Server
//!
//! Binds the listener, runs the accept loop and tracks every connection
//! task so shutdown can wait for all of them.
//!
//! ## Shutdown
//!
//! ```text
//! ServerHandle::stop()
//!     │
//!     │ watch::send(true)
//!     ├──────────────────────────────┬───────────────────────────┐
//!     ▼                              ▼                           ▼
//! accept loop                   idle handler                busy handler
//! (exits at once,               (exits at once)             (finishes its
//!  or within accept_timeout)                                 command first)
//!     │
//!     │ drop listener
//!     │ JoinSet::join_next() until empty
//!     ▼
//! registry.close()  ──>  stop() returns
//! ```

use crate::commands::CommandHandler;
use crate::config::ServerConfig;
use crate::connection::{handle_connection, ConnectionStats};
use crate::queue::{QueueError, QueueRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Errors raised while starting or stopping the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Opening or closing the queue registry failed
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Other I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The accept loop task panicked
    #[error("accept loop failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A bound, not yet running server.
pub struct Server {
    listener: TcpListener,
    registry: Arc<QueueRegistry>,
    stats: Arc<ConnectionStats>,
    config: ServerConfig,
}

impl Server {
    /// Opens the queue registry and binds the listener.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let registry = QueueRegistry::open(&config.data_dir, config.storage_mode)?;

        let addr = config.bind_address();
        let listener = TcpListener::bind(addr.as_str())
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            registry: Arc::new(registry),
            stats: Arc::new(ConnectionStats::new()),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> &Arc<QueueRegistry> {
        &self.registry
    }

    /// Spawns the accept loop and returns a handle to stop it.
    pub fn start(self) -> Result<ServerHandle, ServerError> {
        let local_addr = self.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let registry = Arc::clone(&self.registry);
        let stats = Arc::clone(&self.stats);

        info!(addr = %local_addr, "Listening");
        let accept_task = tokio::spawn(accept_loop(self, shutdown_rx));

        Ok(ServerHandle {
            shutdown_tx,
            accept_task,
            registry,
            stats,
            local_addr,
        })
    }
}

/// Controls a running server.
pub struct ServerHandle {
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
    registry: Arc<QueueRegistry>,
    stats: Arc<ConnectionStats>,
    local_addr: SocketAddr,
}

impl ServerHandle {
    /// The address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<QueueRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }

    /// Signals shutdown and waits until the accept loop and every
    /// connection handler have exited, then closes the registry.
    ///
    /// The registry is closed even when the accept loop panicked; the join
    /// error is reported afterwards.
    pub async fn stop(self) -> Result<(), ServerError> {
        info!("Stopping server");
        let _ = self.shutdown_tx.send(true);

        let joined = self.accept_task.await;
        let closed = self.registry.close();
        joined?;
        closed?;

        info!("Server stopped");
        Ok(())
    }
}

/// Accepts connections until shutdown, then waits for every handler.
async fn accept_loop(server: Server, mut shutdown: watch::Receiver<bool>) {
    let Server {
        listener,
        registry,
        stats,
        config,
    } = server;

    let command_handler = CommandHandler::new(Arc::clone(&registry), Arc::clone(&stats))
        .with_create_on_get(config.create_on_get);
    let limits = config.connection_limits();
    let mut connections = JoinSet::new();

    loop {
        if *shutdown.borrow() {
            break;
        }

        // Reap handlers that already finished
        while connections.try_join_next().is_some() {}

        let accepted = tokio::select! {
            _ = shutdown.changed() => break,
            accepted = tokio::time::timeout(config.accept_timeout, listener.accept()) => accepted,
        };

        match accepted {
            // Nothing arrived; go around and check for shutdown
            Err(_) => continue,
            Ok(Ok((stream, addr))) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
                }
                connections.spawn(handle_connection(
                    stream,
                    addr,
                    command_handler.clone(),
                    Arc::clone(&stats),
                    limits,
                    shutdown.clone(),
                ));
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }

    drop(listener);
    debug!(active = connections.len(), "Accept loop stopped, waiting for connections");

    while let Some(result) = connections.join_next().await {
        if let Err(e) = result {
            warn!(error = %e, "Connection task failed");
        }
    }
}
