// src/hash.rs
//! Block hashing: lowercase hex SHA-1, the content-addressed block name.

use sha1::{Digest, Sha1};

/// Compute the lowercase hex SHA-1 of a byte slice.
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Split a hash into its shard prefix (first two hex chars) and the rest.
pub fn shard(hash: &str) -> (&str, &str) {
    hash.split_at(2)
}
