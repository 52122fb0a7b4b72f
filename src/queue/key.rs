//! Queue names and item keys.
//!
//! An item key is the queue's key prefix followed by the item id as an
//! 8-byte big-endian integer, so the store's byte ordering is the queue's
//! FIFO ordering:
//!
//! ```text
//! isolated:  [00 00 00 00 00 00 00 01]
//! shared:    [6F 72 64 65 72 73 2F | 00 00 00 00 00 00 00 01]
//!             o  r  d  e  r  s  /    id = 1
//! ```

use crate::queue::error::{QueueError, QueueResult};

/// Width of the encoded item id.
pub const ID_LEN: usize = 8;

/// Maximum queue name length.
pub const MAX_NAME_LEN: usize = 100;

/// Terminates a queue name inside a shared-store key prefix. It is not a
/// legal name character, which keeps every queue's prefix range disjoint.
pub const PREFIX_SEPARATOR: u8 = b'/';

/// Checks a queue name against the allowed charset and length.
pub fn validate_name(name: &str) -> QueueResult<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b':'));
    if !valid {
        return Err(QueueError::InvalidName);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(QueueError::NameTooLong);
    }
    Ok(())
}

/// The key prefix of a queue living in a shared store.
pub fn shared_prefix(name: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(name.len() + 1);
    prefix.extend_from_slice(name.as_bytes());
    prefix.push(PREFIX_SEPARATOR);
    prefix
}

/// Encodes the store key of item `id`.
pub fn item_key(prefix: &[u8], id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + ID_LEN);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Decodes the item id from a store key, if the key is well formed.
pub fn key_to_id(prefix: &[u8], key: &[u8]) -> Option<u64> {
    let encoded = key.strip_prefix(prefix)?;
    let bytes: [u8; ID_LEN] = encoded.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}
