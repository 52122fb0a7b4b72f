//! Text Protocol Implementation
//!
//! Vida speaks a memcached-style, line-oriented text protocol. Commands are
//! single lines; SET is followed by a data block of exactly the declared
//! length plus `\r\n`.
//!
//! ## Modules
//!
//! - `types`: `Command`, `Verb` and the `Response` serializer
//! - `parser`: command line parsing
//! - `error`: the `ERROR` / `CLIENT_ERROR` / `SERVER_ERROR` taxonomy
//!
//! ## Example
//!
//! ```
//! use vida::protocol::{parse_command, Response, Verb};
//! use bytes::Bytes;
//!
//! let cmd = parse_command(b"SET orders 0 0 5\r\n").unwrap();
//! assert_eq!(cmd.verb, Verb::Set);
//! assert_eq!(cmd.payload_size, 5);
//!
//! let reply = Response::Value {
//!     queue: "orders".into(),
//!     payload: Bytes::from("hello"),
//!     cas: None,
//! };
//! assert_eq!(reply.serialize(), b"VALUE orders 0 5\r\nhello\r\nEND\r\n");
//! ```

pub mod error;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{ErrorClass, ProtocolError};
pub use parser::{find_line, parse_command, MAX_LINE_LEN};
pub use types::{Command, Response, Verb, CRLF};
