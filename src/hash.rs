//! Content-hash generation for factory keys.
//!
//! A factory is identified within a server by the SHA-1 of its canonical
//! source plus the server's identity, so that the same DSP text posted to
//! two different servers yields two distinct keys, while re-posting the
//! same text to the same server reuses the cached factory.

use sha1::{Digest, Sha1};

/// Compute the factory key for `canonical_source` against `server_id`
/// (typically `host:port`). Hex-encoded, lowercase, matching the wire
/// `shaKey` field.
pub fn factory_key(canonical_source: &str, server_id: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(canonical_source.as_bytes());
    hasher.update(server_id.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_source_and_server_hash_identically() {
        let a = factory_key("process = _;", "localhost:7777");
        let b = factory_key("process = _;", "localhost:7777");
        assert_eq!(a, b);
    }

    #[test]
    fn different_servers_hash_differently() {
        let a = factory_key("process = _;", "localhost:7777");
        let b = factory_key("process = _;", "otherhost:7777");
        assert_ne!(a, b);
    }

    #[test]
    fn key_is_lowercase_hex_sha1_length() {
        let key = factory_key("process = _;", "localhost:7777");
        assert_eq!(key.len(), 40);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
