//! Commands and Replies
//!
//! This module defines the parsed form of a command line and the replies
//! the server writes back.
//!
//! ## Reply Format
//!
//! Every reply is one or more `\r\n`-terminated lines; a retrieved item adds
//! its raw payload between the header line and `END`:
//!
//! ```text
//! STORED
//! VALUE <queue> 0 <len>[ <id>]      (id only for GETS)
//! <payload>
//! END
//! DELETED | NOT_FOUND
//! STAT <name> <value>  ... END
//! VERSION <version>
//! <CLASS> <message>
//! ```

use crate::protocol::error::ProtocolError;
use bytes::Bytes;
use std::fmt;

/// The line terminator used throughout the protocol
pub const CRLF: &[u8] = b"\r\n";

/// Suffix on a GET queue name that turns the dequeue into a peek
pub const PEEK_SUFFIX: &str = "/peek";

/// Separator between fan-out targets in a SET queue spec
pub const FANOUT_SEPARATOR: char = '+';

/// Recognised command verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// `SET <queue>[+<queue>...] <flags> <exptime> <bytes> [cas]`
    Set,
    /// `GET <queue>[/peek] [<consumer-group>]`
    Get,
    /// Like GET, with the item id in the reply
    Gets,
    /// `DELETE <queue>` drains the queue
    Delete,
    /// `STATS`
    Stats,
    /// `VERSION`
    Version,
    /// `QUIT` closes the connection without a reply
    Quit,
}

impl Verb {
    /// Matches an already lower-cased verb token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "set" => Some(Verb::Set),
            "get" => Some(Verb::Get),
            "gets" => Some(Verb::Gets),
            "delete" => Some(Verb::Delete),
            "stats" => Some(Verb::Stats),
            "version" => Some(Verb::Version),
            "quit" => Some(Verb::Quit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Set => "set",
            Verb::Get => "get",
            Verb::Gets => "gets",
            Verb::Delete => "delete",
            Verb::Stats => "stats",
            Verb::Version => "version",
            Verb::Quit => "quit",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,

    /// The (first) queue the command addresses. Empty for verbs without one.
    pub queue_name: String,

    /// Every SET target, in order, when the queue spec contained `+`
    pub fanout_targets: Option<Vec<String>>,

    /// Optional third GET token. Recorded and logged, otherwise unused.
    pub consumer_group: Option<String>,

    /// Declared data block length for SET
    pub payload_size: u32,

    /// GET on `<queue>/peek`
    pub peek: bool,
}

impl Command {
    pub fn new(verb: Verb) -> Self {
        Self {
            verb,
            queue_name: String::new(),
            fanout_targets: None,
            consumer_group: None,
            payload_size: 0,
            peek: false,
        }
    }

    /// The queues a SET writes to, in fan-out order.
    pub fn targets(&self) -> &[String] {
        match &self.fanout_targets {
            Some(targets) => targets,
            None => std::slice::from_ref(&self.queue_name),
        }
    }

    /// True if the command is followed by a data block.
    pub fn expects_data(&self) -> bool {
        self.verb == Verb::Set
    }
}

/// A reply to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Every target accepted the item
    Stored,

    /// One retrieved item, then `END`
    Value {
        queue: String,
        payload: Bytes,
        /// Item id, written only for GETS
        cas: Option<u64>,
    },

    /// Nothing to retrieve
    End,

    Deleted,
    NotFound,

    /// `STAT` lines followed by `END`
    Stats(Vec<(String, String)>),

    Version(String),

    Error(ProtocolError),
}

impl Response {
    /// Serializes the reply for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Stored => line(buf, "STORED"),
            Response::Value {
                queue,
                payload,
                cas,
            } => {
                let header = match cas {
                    Some(id) => format!("VALUE {} 0 {} {}", queue, payload.len(), id),
                    None => format!("VALUE {} 0 {}", queue, payload.len()),
                };
                buf.reserve(header.len() + payload.len() + 9);
                line(buf, &header);
                buf.extend_from_slice(payload);
                buf.extend_from_slice(CRLF);
                line(buf, "END");
            }
            Response::End => line(buf, "END"),
            Response::Deleted => line(buf, "DELETED"),
            Response::NotFound => line(buf, "NOT_FOUND"),
            Response::Stats(stats) => {
                for (name, value) in stats {
                    line(buf, &format!("STAT {} {}", name, value));
                }
                line(buf, "END");
            }
            Response::Version(version) => line(buf, &format!("VERSION {}", version)),
            Response::Error(err) => line(buf, &err.to_line()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}

impl From<ProtocolError> for Response {
    fn from(err: ProtocolError) -> Self {
        Response::Error(err)
    }
}

fn line(buf: &mut Vec<u8>, text: &str) {
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(CRLF);
}
