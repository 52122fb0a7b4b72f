//! Connection Handler Module
//!
//! This module handles individual client connections to Vida.
//! Each client gets its own handler task that runs in a loop,
//! reading commands and sending replies.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────────┐
//!    │      Main Loop                   │
//!    │                                  │
//!    │  ┌─────────────────────────────┐ │
//!    │  │ Read line (idle timeout,    │ │──> shutdown: exit
//!    │  │ shutdown aware)             │ │──> timeout: close
//!    │  └─────────────┬───────────────┘ │
//!    │                ▼                 │
//!    │  ┌─────────────────────────────┐ │
//!    │  │ Parse command               │ │──> error reply
//!    │  └─────────────┬───────────────┘ │
//!    │                ▼                 │
//!    │  ┌─────────────────────────────┐ │
//!    │  │ SET: read <bytes>+2 octets  │ │──> bad data chunk
//!    │  └─────────────┬───────────────┘ │
//!    │                ▼                 │
//!    │  ┌─────────────────────────────┐ │
//!    │  │ Execute, send reply         │ │
//!    │  └─────────────┬───────────────┘ │
//!    │                ▼                 │
//!    │           [Loop back]            │
//!    └──────────────────────────────────┘
//!        │
//!        ▼
//! 4. QUIT / client disconnects / fatal error / shutdown
//!        │
//!        ▼
//! 5. Handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! We use a BytesMut buffer to accumulate incoming data. Command lines are
//! split off the front of the buffer; a SET data block is read until the
//! buffer holds exactly the framed size, so the buffer grows to fit large
//! payloads and is reused for the next command.
//!
//! ## Timeouts
//!
//! Waiting for a command line is bounded by the idle timeout. Reading a data
//! block is not: once a valid SET header arrived the transfer may take as
//! long as it needs.

use crate::commands::CommandHandler;
use crate::protocol::{
    find_line, parse_command, Command, ProtocolError, Response, CRLF, MAX_LINE_LEN,
};
use bytes::{Buf, Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Chunk size used when discarding an oversized data block
const DISCARD_CHUNK_SIZE: usize = 64 * 1024;

/// Default time a client may take to send a command line
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3);

/// Default largest accepted data block (512 MB)
pub const DEFAULT_MAX_ITEM_SIZE: u32 = 512 * 1024 * 1024;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
    /// SET commands executed
    pub cmd_set: AtomicU64,
    /// GET / GETS commands executed
    pub cmd_get: AtomicU64,
    /// GETs that returned an item
    pub get_hits: AtomicU64,
    /// GETs that found nothing
    pub get_misses: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Per-connection limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    /// How long to wait for a complete command line
    pub idle_timeout: Duration,
    /// Largest SET data block accepted
    pub max_item_size: u32,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_item_size: DEFAULT_MAX_ITEM_SIZE,
        }
    }
}

/// Handles a single client connection.
///
/// This struct manages the read buffer, framing, and reply sending for one
/// connected client. It is generic over the stream so tests can drive it
/// with in-memory I/O.
pub struct ConnectionHandler<S> {
    /// The client stream
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command handler (shared across connections)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    limits: ConnectionLimits,

    /// Flips to `true` when the server stops
    shutdown: watch::Receiver<bool>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The client stream
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    /// * `limits` - Idle timeout and item size limit
    /// * `shutdown` - Server shutdown signal
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        limits: ConnectionLimits,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            stats,
            limits,
            shutdown,
        }
    }

    /// Runs the main connection loop.
    ///
    /// This method reads commands from the client, executes them, and sends
    /// back replies until the client quits or disconnects, a fatal error
    /// occurs, or the server shuts down.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                ConnectionError::IdleTimeout => {
                    debug!(client = %self.addr, "Client idle, closing")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        let _ = self.stream.shutdown().await;
        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let line = match self.read_line().await? {
                Some(line) => line,
                None => {
                    debug!(client = %self.addr, "Shutdown signalled, closing connection");
                    return Ok(());
                }
            };
            self.stats.command_processed();

            let cmd = match parse_command(&line) {
                Ok(cmd) => cmd,
                Err(e) => {
                    trace!(client = %self.addr, error = %e, "Rejected command line");
                    self.send_response(&Response::Error(e)).await?;
                    continue;
                }
            };

            let payload = if cmd.expects_data() {
                match self.read_data_block(&cmd).await? {
                    Some(payload) => payload,
                    None => continue,
                }
            } else {
                Bytes::new()
            };

            match self.command_handler.execute(&cmd, &payload) {
                Some(response) => self.send_response(&response).await?,
                None => return Ok(()),
            }
        }
    }

    /// Waits for the next complete command line.
    ///
    /// Returns `Ok(None)` when the server is shutting down.
    async fn read_line(&mut self) -> Result<Option<Bytes>, ConnectionError> {
        let deadline = Instant::now() + self.limits.idle_timeout;

        loop {
            if let Some(len) = find_line(&self.buffer) {
                if len > MAX_LINE_LEN {
                    return Err(ConnectionError::LineTooLong);
                }
                return Ok(Some(self.buffer.split_to(len).freeze()));
            }

            if self.buffer.len() >= MAX_LINE_LEN {
                return Err(ConnectionError::LineTooLong);
            }

            if *self.shutdown.borrow() {
                return Ok(None);
            }

            let read = tokio::select! {
                biased;
                _ = self.shutdown.changed() => None,
                result = tokio::time::timeout_at(
                    deadline,
                    self.stream.get_mut().read_buf(&mut self.buffer),
                ) => Some(result),
            };

            let Some(result) = read else {
                return Ok(None);
            };
            let n = result.map_err(|_| ConnectionError::IdleTimeout)??;
            if n == 0 {
                // Connection closed by client
                return if self.buffer.is_empty() {
                    Err(ConnectionError::ClientDisconnected)
                } else {
                    // Partial command in buffer
                    Err(ConnectionError::UnexpectedEof)
                };
            }
            self.record_read(n);
        }
    }

    /// Reads the data block following a SET header.
    ///
    /// Returns `Ok(None)` if the block was rejected and a reply already
    /// sent; the connection stays usable.
    async fn read_data_block(&mut self, cmd: &Command) -> Result<Option<Bytes>, ConnectionError> {
        let size = cmd.payload_size as usize;
        let framed = size + CRLF.len();

        if cmd.payload_size > self.limits.max_item_size {
            warn!(
                client = %self.addr,
                size,
                max = self.limits.max_item_size,
                "Data block too large, discarding"
            );
            self.discard(framed).await?;
            self.send_response(&Response::Error(ProtocolError::ObjectTooLarge))
                .await?;
            return Ok(None);
        }

        let frame = match self.read_exact_frame(framed).await {
            Ok(frame) => frame,
            Err(ConnectionError::UnexpectedEof) => {
                // Best effort: the client may have half-closed its side
                let _ = self
                    .send_response(&Response::Error(ProtocolError::BadDataChunk))
                    .await;
                return Err(ConnectionError::UnexpectedEof);
            }
            Err(e) => return Err(e),
        };

        if &frame[size..] != CRLF {
            trace!(client = %self.addr, size, "Data block not terminated by CRLF");
            self.send_response(&Response::Error(ProtocolError::BadDataChunk))
                .await?;
            return Ok(None);
        }

        Ok(Some(frame.slice(..size)))
    }

    /// Reads until the buffer holds `len` bytes and splits them off.
    async fn read_exact_frame(&mut self, len: usize) -> Result<Bytes, ConnectionError> {
        if self.buffer.capacity() < len {
            self.buffer.reserve(len - self.buffer.len());
        }

        while self.buffer.len() < len {
            self.read_block_chunk().await?;
        }

        Ok(self.buffer.split_to(len).freeze())
    }

    /// Consumes and drops `len` bytes from the connection.
    async fn discard(&mut self, mut len: usize) -> Result<(), ConnectionError> {
        loop {
            let take = len.min(self.buffer.len());
            self.buffer.advance(take);
            len -= take;
            if len == 0 {
                return Ok(());
            }

            self.buffer.reserve(DISCARD_CHUNK_SIZE.min(len));
            self.read_block_chunk().await?;
        }
    }

    /// Reads more of a data block. EOF here always cuts a frame short.
    async fn read_block_chunk(&mut self) -> Result<(), ConnectionError> {
        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            return Err(ConnectionError::UnexpectedEof);
        }
        self.record_read(n);
        Ok(())
    }

    fn record_read(&self, n: usize) {
        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");
    }

    /// Sends a reply to the client.
    async fn send_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial command or data block)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// No complete command line within the idle timeout
    #[error("Idle timeout")]
    IdleTimeout,

    /// Command line longer than the line limit
    #[error("Command line too long")]
    LineTooLong,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    limits: ConnectionLimits,
    shutdown: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats, limits, shutdown);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected | ConnectionError::IdleTimeout => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueRegistry;
    use crate::storage::MemoryStore;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn client_addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn create_command_handler() -> CommandHandler {
        let registry = QueueRegistry::with_shared_store("/unused", Arc::new(MemoryStore::new()));
        CommandHandler::new(Arc::new(registry), Arc::new(ConnectionStats::new()))
    }

    fn spawn_handler(
        command_handler: CommandHandler,
        limits: ConnectionLimits,
    ) -> (
        DuplexStream,
        watch::Sender<bool>,
        tokio::task::JoinHandle<Result<(), ConnectionError>>,
    ) {
        let (client, server) = duplex(1024 * 1024);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handler = ConnectionHandler::new(
            server,
            client_addr(),
            command_handler,
            Arc::new(ConnectionStats::new()),
            limits,
            shutdown_rx,
        );
        (client, shutdown_tx, tokio::spawn(handler.run()))
    }

    async fn read_exactly(client: &mut DuplexStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        client.read_exact(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let mock = tokio_test::io::Builder::new()
            .read(b"SET orders 0 0 5\r\nhello\r\n")
            .write(b"STORED\r\n")
            .read(b"GET orders\r\n")
            .write(b"VALUE orders 0 5\r\nhello\r\nEND\r\n")
            .read(b"QUIT\r\n")
            .build();

        let (_tx, rx) = watch::channel(false);
        let handler = ConnectionHandler::new(
            mock,
            client_addr(),
            create_command_handler(),
            Arc::new(ConnectionStats::new()),
            ConnectionLimits::default(),
            rx,
        );
        handler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_connection() {
        let mock = tokio_test::io::Builder::new()
            .read(b"FOO\r\n")
            .write(b"ERROR Unknown command\r\n")
            .read(b"VERSION\r\n")
            .write(format!("VERSION {}\r\n", crate::VERSION).as_bytes())
            .read(b"quit\r\n")
            .build();

        let (_tx, rx) = watch::channel(false);
        let handler = ConnectionHandler::new(
            mock,
            client_addr(),
            create_command_handler(),
            Arc::new(ConnectionStats::new()),
            ConnectionLimits::default(),
            rx,
        );
        handler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_size_reads_no_block() {
        let command_handler = create_command_handler();
        let registry = Arc::clone(command_handler.registry());

        // The line after the bad header is parsed as a command of its own
        let mock = tokio_test::io::Builder::new()
            .read(b"SET orders 0 0 abc\r\n")
            .write(b"CLIENT_ERROR Invalid <bytes> number\r\n")
            .read(b"GET orders\r\n")
            .write(b"END\r\n")
            .read(b"QUIT\r\n")
            .build();

        let (_tx, rx) = watch::channel(false);
        let handler = ConnectionHandler::new(
            mock,
            client_addr(),
            command_handler,
            Arc::new(ConnectionStats::new()),
            ConnectionLimits::default(),
            rx,
        );
        handler.run().await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_bad_data_chunk() {
        let command_handler = create_command_handler();
        let registry = Arc::clone(command_handler.registry());

        let mock = tokio_test::io::Builder::new()
            .read(b"SET orders 0 0 3\r\nfooXY")
            .write(b"CLIENT_ERROR bad data chunk\r\n")
            .read(b"QUIT\r\n")
            .build();

        let (_tx, rx) = watch::channel(false);
        let handler = ConnectionHandler::new(
            mock,
            client_addr(),
            command_handler,
            Arc::new(ConnectionStats::new()),
            ConnectionLimits::default(),
            rx,
        );
        handler.run().await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_short_frame_then_eof() {
        let command_handler = create_command_handler();
        let registry = Arc::clone(command_handler.registry());
        let (mut client, _tx, task) = spawn_handler(command_handler, ConnectionLimits::default());

        client.write_all(b"SET orders 0 0 5\r\nhi\r\n").await.unwrap();
        client.shutdown().await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ConnectionError::UnexpectedEof)));

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"CLIENT_ERROR bad data chunk\r\n");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_fanout_over_the_wire() {
        let command_handler = create_command_handler();
        let registry = Arc::clone(command_handler.registry());

        let mock = tokio_test::io::Builder::new()
            .read(b"SET a+b 0 0 3\r\nfoo\r\n")
            .write(b"STORED\r\n")
            .read(b"GETS a\r\n")
            .write(b"VALUE a 0 3 1\r\nfoo\r\nEND\r\n")
            .read(b"GETS b\r\n")
            .write(b"VALUE b 0 3 1\r\nfoo\r\nEND\r\n")
            .read(b"QUIT\r\n")
            .build();

        let (_tx, rx) = watch::channel(false);
        let handler = ConnectionHandler::new(
            mock,
            client_addr(),
            command_handler,
            Arc::new(ConnectionStats::new()),
            ConnectionLimits::default(),
            rx,
        );
        handler.run().await.unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_block_is_discarded() {
        let limits = ConnectionLimits {
            max_item_size: 4,
            ..ConnectionLimits::default()
        };

        let mock = tokio_test::io::Builder::new()
            .read(b"SET orders 0 0 8\r\n")
            .read(b"12345678\r\n")
            .write(b"CLIENT_ERROR object too large for cache\r\n")
            .read(b"SET orders 0 0 4\r\n1234\r\n")
            .write(b"STORED\r\n")
            .read(b"QUIT\r\n")
            .build();

        let (_tx, rx) = watch::channel(false);
        let handler = ConnectionHandler::new(
            mock,
            client_addr(),
            create_command_handler(),
            Arc::new(ConnectionStats::new()),
            limits,
            rx,
        );
        handler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_pipelined_commands() {
        let mock = tokio_test::io::Builder::new()
            .read(b"SET q 0 0 1\r\na\r\nSET q 0 0 1\r\nb\r\nGET q\r\nGET q\r\nQUIT\r\n")
            .write(b"STORED\r\n")
            .write(b"STORED\r\n")
            .write(b"VALUE q 0 1\r\na\r\nEND\r\n")
            .write(b"VALUE q 0 1\r\nb\r\nEND\r\n")
            .build();

        let (_tx, rx) = watch::channel(false);
        let handler = ConnectionHandler::new(
            mock,
            client_addr(),
            create_command_handler(),
            Arc::new(ConnectionStats::new()),
            ConnectionLimits::default(),
            rx,
        );
        handler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_large_payload() {
        let (mut client, _tx, task) =
            spawn_handler(create_command_handler(), ConnectionLimits::default());

        let payload: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
        client
            .write_all(format!("SET big 0 0 {}\r\n", payload.len()).as_bytes())
            .await
            .unwrap();
        client.write_all(&payload).await.unwrap();
        client.write_all(b"\r\n").await.unwrap();
        assert_eq!(read_exactly(&mut client, 8).await, b"STORED\r\n");

        client.write_all(b"GET big\r\n").await.unwrap();
        let header = format!("VALUE big 0 {}\r\n", payload.len());
        assert_eq!(read_exactly(&mut client, header.len()).await, header.as_bytes());
        assert_eq!(read_exactly(&mut client, payload.len()).await, payload);
        assert_eq!(read_exactly(&mut client, 7).await, b"\r\nEND\r\n");

        client.write_all(b"QUIT\r\n").await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_idle_timeout_closes_connection() {
        let limits = ConnectionLimits {
            idle_timeout: Duration::from_millis(50),
            ..ConnectionLimits::default()
        };
        let (mut client, _tx, task) = spawn_handler(create_command_handler(), limits);

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ConnectionError::IdleTimeout)));

        // No reply was written before closing
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_partial_line_still_times_out() {
        let limits = ConnectionLimits {
            idle_timeout: Duration::from_millis(50),
            ..ConnectionLimits::default()
        };
        let (mut client, _tx, task) = spawn_handler(create_command_handler(), limits);
        client.write_all(b"GET ord").await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ConnectionError::IdleTimeout)));
    }

    #[tokio::test]
    async fn test_shutdown_while_idle() {
        let limits = ConnectionLimits {
            idle_timeout: Duration::from_secs(60),
            ..ConnectionLimits::default()
        };
        let (_client, tx, task) = spawn_handler(create_command_handler(), limits);

        tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), task).await;
        assert!(result.unwrap().unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let (mut client, _tx, task) =
            spawn_handler(create_command_handler(), ConnectionLimits::default());
        client.write_all(&vec![b'a'; MAX_LINE_LEN + 1]).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ConnectionError::LineTooLong)));
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let stats = Arc::new(ConnectionStats::new());
        let (client, server) = duplex(4096);
        let (_tx, rx) = watch::channel(false);
        let handler = ConnectionHandler::new(
            server,
            client_addr(),
            create_command_handler(),
            Arc::clone(&stats),
            ConnectionLimits::default(),
            rx,
        );

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        let task = tokio::spawn(handler.run());
        let mut client = client;
        client.write_all(b"VERSION\r\nQUIT\r\n").await.unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 2);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
