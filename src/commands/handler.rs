//! Command Handler Module
//!
//! This module executes parsed commands against the queue registry and
//! builds the reply for each one.
//!
//! ## Supported Commands
//!
//! - `SET <queue>[+<queue>...] <flags> <exptime> <bytes> [cas]` - Enqueue (fan-out)
//! - `GET <queue>[/peek] [<group>]` - Dequeue (or peek) one item
//! - `GETS <queue>[/peek] [<group>]` - Same, with the item id as cas token
//! - `DELETE <queue>` - Drain every pending item
//! - `STATS` - Server and queue counters
//! - `VERSION` - Server version
//! - `QUIT` - Close the connection
//!
//! ## Fan-out
//!
//! ```text
//! SET a+b+c 0 0 3
//!
//!   validate a, b, c ──── any invalid ──> CLIENT_ERROR, nothing written
//!          │
//!          ▼
//!   enqueue a ─ ok ─> enqueue b ─ fail ─> SERVER_ERROR
//!                                         (a keeps its copy, c untouched)
//! ```
//!
//! Each target's enqueue is atomic on its own; the fan-out as a whole is
//! not. Targets written before a failure are not rolled back.

use crate::connection::ConnectionStats;
use crate::protocol::{Command, ProtocolError, Response, Verb};
use crate::queue::{validate_name, QueueError, QueueRegistry};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Executes commands against the queue registry.
#[derive(Clone)]
pub struct CommandHandler {
    /// The queue registry (shared across connections)
    registry: Arc<QueueRegistry>,
    /// Server-wide counters reported by STATS
    stats: Arc<ConnectionStats>,
    /// GET opens missing queues instead of reporting them empty
    create_on_get: bool,
    /// Server start time for STATS
    start_time: Instant,
}

impl CommandHandler {
    /// Creates a new command handler over the given registry.
    pub fn new(registry: Arc<QueueRegistry>, stats: Arc<ConnectionStats>) -> Self {
        Self {
            registry,
            stats,
            create_on_get: false,
            start_time: Instant::now(),
        }
    }

    /// Makes GET create queues that do not exist yet.
    pub fn with_create_on_get(mut self, create_on_get: bool) -> Self {
        self.create_on_get = create_on_get;
        self
    }

    pub fn registry(&self) -> &Arc<QueueRegistry> {
        &self.registry
    }

    /// Executes a command and returns the reply.
    ///
    /// `payload` is the data block of a SET, already framed by the caller.
    /// Returns `None` for QUIT, which has no reply.
    pub fn execute(&self, cmd: &Command, payload: &[u8]) -> Option<Response> {
        let response = match cmd.verb {
            Verb::Set => self.store(cmd, payload),
            Verb::Get | Verb::Gets => self.retrieve(cmd),
            Verb::Delete => self.delete(cmd),
            Verb::Stats => self.stats(),
            Verb::Version => Response::Version(crate::VERSION.to_string()),
            Verb::Quit => return None,
        };
        Some(response)
    }

    /// SET: enqueue `payload` to every target in order.
    pub fn store(&self, cmd: &Command, payload: &[u8]) -> Response {
        self.stats.cmd_set.fetch_add(1, Ordering::Relaxed);

        let targets = cmd.targets();
        if let Err(e) = targets.iter().try_for_each(|name| validate_name(name)) {
            return ProtocolError::from(e).into();
        }

        for (written, name) in targets.iter().enumerate() {
            let result = self
                .registry
                .get_or_create(name)
                .and_then(|queue| queue.enqueue(payload));

            match result {
                Ok(id) => debug!(queue = %name, id, bytes = payload.len(), "Stored item"),
                Err(e) => {
                    warn!(
                        queue = %name,
                        written,
                        remaining = targets.len() - written - 1,
                        error = %e,
                        "Fan-out aborted"
                    );
                    return ProtocolError::from(e).into();
                }
            }
        }

        Response::Stored
    }

    /// GET / GETS: dequeue or peek one item. An empty or unknown queue is
    /// answered with a bare `END`.
    pub fn retrieve(&self, cmd: &Command) -> Response {
        self.stats.cmd_get.fetch_add(1, Ordering::Relaxed);

        if let Some(group) = &cmd.consumer_group {
            debug!(queue = %cmd.queue_name, group = %group, "Consumer group requested");
        }

        let queue = if self.create_on_get {
            self.registry.get_or_create(&cmd.queue_name)
        } else {
            self.registry.resolve(&cmd.queue_name)
        };

        let item = queue.and_then(|queue| if cmd.peek { queue.peek() } else { queue.dequeue() });

        match item {
            Ok(item) => {
                self.stats.get_hits.fetch_add(1, Ordering::Relaxed);
                Response::Value {
                    queue: cmd.queue_name.clone(),
                    payload: item.payload,
                    cas: (cmd.verb == Verb::Gets).then_some(item.id),
                }
            }
            Err(QueueError::IsEmpty) | Err(QueueError::NotFound(_)) => {
                self.stats.get_misses.fetch_add(1, Ordering::Relaxed);
                Response::End
            }
            Err(e) => ProtocolError::from(e).into(),
        }
    }

    /// DELETE: drain every pending item of an existing queue.
    pub fn delete(&self, cmd: &Command) -> Response {
        let result = self
            .registry
            .resolve(&cmd.queue_name)
            .and_then(|queue| queue.drain());

        match result {
            Ok(drained) => {
                debug!(queue = %cmd.queue_name, drained, "Queue deleted");
                Response::Deleted
            }
            Err(QueueError::NotFound(_)) => Response::NotFound,
            Err(e) => ProtocolError::from(e).into(),
        }
    }

    /// STATS: server counters, then one group of lines per open queue.
    pub fn stats(&self) -> Response {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let load =
            |counter: &std::sync::atomic::AtomicU64| counter.load(Ordering::Relaxed).to_string();

        let mut lines = vec![
            ("uptime".to_string(), self.start_time.elapsed().as_secs().to_string()),
            ("time".to_string(), now.to_string()),
            ("version".to_string(), crate::VERSION.to_string()),
            ("curr_connections".to_string(), load(&self.stats.active_connections)),
            ("total_connections".to_string(), load(&self.stats.connections_accepted)),
            ("cmd_get".to_string(), load(&self.stats.cmd_get)),
            ("cmd_set".to_string(), load(&self.stats.cmd_set)),
            ("get_hits".to_string(), load(&self.stats.get_hits)),
            ("get_misses".to_string(), load(&self.stats.get_misses)),
            ("bytes_read".to_string(), load(&self.stats.bytes_read)),
            ("bytes_written".to_string(), load(&self.stats.bytes_written)),
            ("curr_queues".to_string(), self.registry.len().to_string()),
        ];

        for queue in self.registry.queues() {
            let name = queue.name();
            lines.push((format!("queue_{}_items", name), queue.len().to_string()));
            lines.push((format!("queue_{}_head", name), queue.head().to_string()));
            lines.push((format!("queue_{}_tail", name), queue.tail().to_string()));
        }

        Response::Stats(lines)
    }
}
