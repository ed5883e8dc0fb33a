//! Server-assigned document identifiers.
//!
//! Identifiers are 24 hex characters: 4 bytes of big-endian unix seconds,
//! 5 bytes of per-process randomness, and a 3-byte wrapping counter.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of an identifier in hex characters.
pub const ID_LEN: usize = 24;

static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

/// Generate a fresh identifier.
pub fn new_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32;
    let process = PROCESS_UNIQUE.get_or_init(rand::random::<[u8; 5]>);
    let counter = COUNTER
        .get_or_init(|| AtomicU32::new(rand::random::<u32>()))
        .fetch_add(1, Ordering::Relaxed);

    let mut bytes = [0u8; 12];
    bytes[..4].copy_from_slice(&secs.to_be_bytes());
    bytes[4..9].copy_from_slice(process);
    bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
    hex::encode(bytes)
}

/// Whether `id` is a well-formed identifier.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_well_formed() {
        let id = new_id();
        assert_eq!(id.len(), ID_LEN);
        assert!(is_valid_id(&id));
    }

    #[test]
    fn generated_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("node-1"));
        assert!(!is_valid_id("zzzzzzzzzzzzzzzzzzzzzzzz"));
        assert!(!is_valid_id("0123456789abcdef01234567ff"));
        assert!(is_valid_id("0123456789abcdef01234567"));
    }
}
