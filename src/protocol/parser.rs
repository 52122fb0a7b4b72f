//! Command Line Parser
//!
//! Turns one text line into a [`Command`]. The line is trimmed of spaces,
//! `\r` and `\n` on both ends and split on single spaces; only the verb is
//! case-insensitive.
//!
//! ```text
//! "SET a+b 0 0 3\r\n"
//!   │   │   │ │ └── payload_size = 3
//!   │   │   └─┴──── flags / exptime (accepted, ignored)
//!   │   └────────── fanout_targets = [a, b], queue_name = a
//!   └────────────── verb = Set
//!
//! "GETS orders/peek workers\r\n"
//!   │    │      │    └── consumer_group = workers
//!   │    │      └─────── peek = true
//!   │    └────────────── queue_name = orders
//!   └─────────────────── verb = Gets
//! ```
//!
//! Queue names are not validated here; that is the queue layer's job, so the
//! client sees the queue's own error message.

use crate::protocol::error::ProtocolError;
use crate::protocol::types::{Command, Verb, FANOUT_SEPARATOR, PEEK_SUFFIX};

/// Longest command line accepted, terminator included.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Returns the length of the first complete line in `buf`, `\n` included.
pub fn find_line(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n').map(|pos| pos + 1)
}

/// Parses a single command line.
pub fn parse_command(line: &[u8]) -> Result<Command, ProtocolError> {
    let text = String::from_utf8_lossy(line);
    let tokens: Vec<&str> = text
        .trim_matches(|c: char| matches!(c, ' ' | '\r' | '\n'))
        .split(' ')
        .collect();

    let verb = tokens[0].to_ascii_lowercase();
    let verb = Verb::from_token(&verb).ok_or(ProtocolError::UnknownCommand)?;

    match verb {
        Verb::Set => parse_set(&tokens),
        Verb::Get | Verb::Gets => parse_get(verb, &tokens),
        Verb::Delete => parse_delete(&tokens),
        Verb::Stats | Verb::Version | Verb::Quit => Ok(Command::new(verb)),
    }
}

/// `SET <queue-spec> <flags> <exptime> <bytes> [cas-unique]`
fn parse_set(tokens: &[&str]) -> Result<Command, ProtocolError> {
    if !(5..=6).contains(&tokens.len()) {
        return Err(ProtocolError::InvalidCommand);
    }

    let payload_size: u32 = tokens[4]
        .parse()
        .map_err(|_| ProtocolError::InvalidDataSize)?;

    let mut cmd = Command::new(Verb::Set);
    cmd.payload_size = payload_size;

    let spec = tokens[1];
    if spec.contains(FANOUT_SEPARATOR) {
        let targets: Vec<String> = spec.split(FANOUT_SEPARATOR).map(str::to_string).collect();
        cmd.queue_name = targets[0].clone();
        cmd.fanout_targets = Some(targets);
    } else {
        cmd.queue_name = spec.to_string();
    }

    Ok(cmd)
}

/// `GET <queue>[/peek] [<consumer-group>]`
fn parse_get(verb: Verb, tokens: &[&str]) -> Result<Command, ProtocolError> {
    if !(2..=3).contains(&tokens.len()) {
        return Err(ProtocolError::InvalidCommand);
    }

    let mut cmd = Command::new(verb);
    match tokens[1].strip_suffix(PEEK_SUFFIX) {
        Some(name) => {
            cmd.queue_name = name.to_string();
            cmd.peek = true;
        }
        None => cmd.queue_name = tokens[1].to_string(),
    }
    cmd.consumer_group = tokens.get(2).map(|group| group.to_string());

    Ok(cmd)
}

/// `DELETE <queue>`
fn parse_delete(tokens: &[&str]) -> Result<Command, ProtocolError> {
    if tokens.len() != 2 {
        return Err(ProtocolError::InvalidCommand);
    }

    let mut cmd = Command::new(Verb::Delete);
    cmd.queue_name = tokens[1].to_string();
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set() {
        let cmd = parse_command(b"SET orders 0 0 5\r\n").unwrap();
        assert_eq!(cmd.verb, Verb::Set);
        assert_eq!(cmd.queue_name, "orders");
        assert_eq!(cmd.payload_size, 5);
        assert_eq!(cmd.fanout_targets, None);
        assert_eq!(cmd.targets(), &["orders".to_string()]);
    }

    #[test]
    fn test_parse_set_with_cas_token() {
        let cmd = parse_command(b"set orders 0 0 5 99\r\n").unwrap();
        assert_eq!(cmd.payload_size, 5);
    }

    #[test]
    fn test_parse_set_fanout() {
        let cmd = parse_command(b"SET a+b+c 0 0 3\r\n").unwrap();
        assert_eq!(cmd.queue_name, "a");
        assert_eq!(
            cmd.fanout_targets,
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_parse_set_token_count() {
        assert_eq!(parse_command(b"SET orders 0 5\r\n"), Err(ProtocolError::InvalidCommand));
        assert_eq!(
            parse_command(b"SET orders 0 0 5 1 extra\r\n"),
            Err(ProtocolError::InvalidCommand)
        );
    }

    #[test]
    fn test_parse_set_bad_size() {
        assert_eq!(
            parse_command(b"SET orders 0 0 abc\r\n"),
            Err(ProtocolError::InvalidDataSize)
        );
        assert_eq!(
            parse_command(b"SET orders 0 0 -1\r\n"),
            Err(ProtocolError::InvalidDataSize)
        );
        assert_eq!(
            parse_command(b"SET orders 0 0 99999999999\r\n"),
            Err(ProtocolError::InvalidDataSize)
        );
    }

    #[test]
    fn test_parse_get() {
        let cmd = parse_command(b"GET orders\r\n").unwrap();
        assert_eq!(cmd.verb, Verb::Get);
        assert_eq!(cmd.queue_name, "orders");
        assert!(!cmd.peek);
        assert_eq!(cmd.consumer_group, None);
    }

    #[test]
    fn test_parse_gets_peek_and_group() {
        let cmd = parse_command(b"gets orders/peek workers\r\n").unwrap();
        assert_eq!(cmd.verb, Verb::Gets);
        assert_eq!(cmd.queue_name, "orders");
        assert!(cmd.peek);
        assert_eq!(cmd.consumer_group.as_deref(), Some("workers"));
    }

    #[test]
    fn test_parse_get_token_count() {
        assert_eq!(parse_command(b"GET\r\n"), Err(ProtocolError::InvalidCommand));
        assert_eq!(parse_command(b"GET a b c\r\n"), Err(ProtocolError::InvalidCommand));
    }

    #[test]
    fn test_verb_is_case_insensitive() {
        for line in [&b"QuIt\r\n"[..], b"quit\n", b"  QUIT  \r\n"] {
            assert_eq!(parse_command(line).unwrap().verb, Verb::Quit);
        }
    }

    #[test]
    fn test_parse_admin_verbs() {
        assert_eq!(parse_command(b"stats\r\n").unwrap().verb, Verb::Stats);
        assert_eq!(parse_command(b"VERSION\r\n").unwrap().verb, Verb::Version);

        let cmd = parse_command(b"DELETE orders\r\n").unwrap();
        assert_eq!(cmd.verb, Verb::Delete);
        assert_eq!(cmd.queue_name, "orders");
        assert_eq!(parse_command(b"DELETE\r\n"), Err(ProtocolError::InvalidCommand));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(parse_command(b"FOO\r\n"), Err(ProtocolError::UnknownCommand));
        assert_eq!(parse_command(b"\r\n"), Err(ProtocolError::UnknownCommand));
    }

    #[test]
    fn test_split_on_single_spaces() {
        // A double space produces an empty token in the size position
        assert_eq!(
            parse_command(b"SET orders 0 0  5\r\n"),
            Err(ProtocolError::InvalidDataSize)
        );
    }

    #[test]
    fn test_find_line() {
        assert_eq!(find_line(b"GET a\r\nrest"), Some(7));
        assert_eq!(find_line(b"GET a"), None);
        assert_eq!(find_line(b"\n"), Some(1));
    }
}
