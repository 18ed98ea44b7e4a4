//! Deterministic content hashing (C1).
//!
//! Two algorithms are used across the kernel and neither is configurable:
//! SHA-256 for the PDO chain, the ledger, and SCRAM audit content; SHA3-512
//! for the governance integrity baseline. An algorithm swap would
//! invalidate every persisted record, so these stay fixed.

use sha2::{Digest, Sha256};
use sha3::Sha3_512;
use std::io::Read;

/// Length in hex characters of a SHA-256 digest.
pub const SHA256_HEX_LEN: usize = 64;

/// Length in hex characters of a SHA3-512 digest.
pub const SHA3_512_HEX_LEN: usize = 128;

/// 64 lowercase zeros: the `previous_entry_hash` of a ledger's first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// SHA-256 of raw bytes, returned as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA-256 of a `serde_json::Value`, hashing its canonical (sorted-key)
/// serialization so the digest is reproducible regardless of field
/// insertion order.
pub fn sha256_of_value(value: &serde_json::Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}

/// SHA-256 over the concatenation of several fields, joined with `|`.
/// Used wherever a stable, field-order-sensitive preimage is needed.
pub fn sha256_joined(parts: &[&str]) -> String {
    sha256_hex(parts.join("|").as_bytes())
}

/// SHA3-512 of raw bytes, returned as lowercase hex. Used only for the
/// governance integrity baseline.
pub fn sha3_512_hex(data: &[u8]) -> String {
    let mut hasher = Sha3_512::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Sentinel value recorded when a protected file cannot be found.
pub const FILE_MISSING_SENTINEL: &str = "FILE_MISSING";

/// Sentinel value recorded when a protected file could not be read for a
/// reason other than "not found" (permissions, I/O error).
pub const HASH_ERROR_SENTINEL: &str = "HASH_ERROR";

/// Compute the SHA3-512 hash of a file on disk, chunked, matching
/// `integrity_sentinel.py::_compute_hash`. Never panics: missing or
/// unreadable files map to sentinel strings rather than propagating an
/// error, since the sentinel treats any such mismatch as a breach anyway.
pub fn sha3_512_of_file(path: &std::path::Path) -> String {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return FILE_MISSING_SENTINEL.to_string()
        }
        Err(_) => return HASH_ERROR_SENTINEL.to_string(),
    };
    let mut reader = std::io::BufReader::new(file);
    let mut hasher = Sha3_512::new();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(_) => return HASH_ERROR_SENTINEL.to_string(),
        }
    }
    hex::encode(hasher.finalize())
}

/// Produce a canonical JSON string (keys sorted) for hashing purposes.
fn canonical_json(value: &serde_json::Value) -> String {
    fn sort(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let mut sorted = serde_json::Map::new();
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for k in keys {
                    sorted.insert(k.clone(), sort(&map[k]));
                }
                serde_json::Value::Object(sorted)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(sort).collect())
            }
            other => other.clone(),
        }
    }
    sort(value).to_string()
}
